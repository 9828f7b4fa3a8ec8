use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Point-in-time scheduler contention counters read from the target system.
///
/// All counters are cumulative since the target started, so degradation shows up as the delta
/// between two samples rather than in any single value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentionCounters {
    /// Time runnable tasks spent queued waiting for a CPU core, in milliseconds.
    pub signal_wait_ms: u64,
    /// Total wait time across all wait categories, in milliseconds.
    pub total_wait_ms: u64,
    /// Tasks currently runnable but not running.
    pub runnable_tasks: u64,
    /// Cooperative scheduler yields.
    pub yields: u64,
}

/// One sampler tick: the counters plus when they were taken.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub taken_at: DateTime<Utc>,
    pub signal_wait_ms: u64,
    pub total_wait_ms: u64,
    pub runnable_tasks: u64,
    pub yields: u64,
}

impl MetricSample {
    pub fn new(taken_at: DateTime<Utc>, counters: ContentionCounters) -> Self {
        Self {
            taken_at,
            signal_wait_ms: counters.signal_wait_ms,
            total_wait_ms: counters.total_wait_ms,
            runnable_tasks: counters.runnable_tasks,
            yields: counters.yields,
        }
    }
}

#[derive(Debug, Default)]
struct SampleLogInner {
    samples: Vec<MetricSample>,
    gaps: Vec<DateTime<Utc>>,
}

/// An append-only log of metric samples, written by exactly one sampler.
///
/// Timestamps are assigned under the log lock and clamped to be strictly increasing, so the
/// ordering invariant holds even if the wall clock steps backwards between ticks.
#[derive(Debug, Default)]
pub struct SampleLog {
    inner: Mutex<SampleLogInner>,
}

impl SampleLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful sample, returning the timestamp it was filed under.
    pub fn record(&self, counters: ContentionCounters) -> DateTime<Utc> {
        let mut inner = self.inner.lock();
        let taken_at = Self::next_timestamp(inner.samples.last().map(|s| s.taken_at));
        inner.samples.push(MetricSample::new(taken_at, counters));
        taken_at
    }

    /// Record a tick whose sample failed. The gap is surfaced in the report as an unsampled
    /// interval; the failed read is not retried mid-interval so the cadence stays intact.
    pub fn record_gap(&self) {
        self.inner.lock().gaps.push(Utc::now());
    }

    pub fn samples(&self) -> Vec<MetricSample> {
        self.inner.lock().samples.clone()
    }

    pub fn sample_count(&self) -> usize {
        self.inner.lock().samples.len()
    }

    pub fn gap_count(&self) -> usize {
        self.inner.lock().gaps.len()
    }

    fn next_timestamp(last: Option<DateTime<Utc>>) -> DateTime<Utc> {
        let now = Utc::now();
        match last {
            Some(last) if now <= last => last + ChronoDuration::milliseconds(1),
            _ => now,
        }
    }
}
