use chrono::{DateTime, Utc};
use grindstone_instruments::MetricSample;
use parking_lot::Mutex;

/// The phases a run moves through, in order. Transitions are explicit and recorded; there is no
/// implicit sequencing between the concurrent actors beyond these windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Setup,
    Baseline,
    Running,
    Draining,
    PostCapture,
    Reporting,
    Done,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunPhase::Setup => "setup",
            RunPhase::Baseline => "baseline",
            RunPhase::Running => "running",
            RunPhase::Draining => "draining",
            RunPhase::PostCapture => "post-capture",
            RunPhase::Reporting => "reporting",
            RunPhase::Done => "done",
        };
        write!(f, "{name}")
    }
}

/// The wall-clock boundaries of one phase. Used to slice the sample stream when building the
/// comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPhaseWindow {
    pub phase: RunPhase,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl RunPhaseWindow {
    fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.started_at && self.ended_at.map(|end| at < end).unwrap_or(true)
    }
}

/// Records phase transitions as they happen.
#[derive(Debug, Default)]
pub struct PhaseTracker {
    windows: Mutex<Vec<RunPhaseWindow>>,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the current phase window and open one for `phase`.
    pub fn enter(&self, phase: RunPhase) {
        let now = Utc::now();
        let mut windows = self.windows.lock();
        if let Some(open) = windows.last_mut() {
            if open.ended_at.is_none() {
                open.ended_at = Some(now);
            }
        }
        log::info!("Entering phase: {phase}");
        windows.push(RunPhaseWindow {
            phase,
            started_at: now,
            ended_at: None,
        });
    }

    pub fn window(&self, phase: RunPhase) -> Option<RunPhaseWindow> {
        self.windows.lock().iter().find(|w| w.phase == phase).cloned()
    }

    pub fn windows(&self) -> Vec<RunPhaseWindow> {
        self.windows.lock().clone()
    }

    /// The samples taken while `phase` was active, in order.
    pub fn slice_samples(&self, phase: RunPhase, samples: &[MetricSample]) -> Vec<MetricSample> {
        match self.window(phase) {
            Some(window) => samples
                .iter()
                .filter(|sample| window.contains(sample.taken_at))
                .copied()
                .collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grindstone_instruments::ContentionCounters;

    #[test]
    fn entering_a_phase_closes_the_previous_window() {
        let tracker = PhaseTracker::new();
        tracker.enter(RunPhase::Setup);
        tracker.enter(RunPhase::Baseline);
        tracker.enter(RunPhase::Running);

        let windows = tracker.windows();
        assert_eq!(windows.len(), 3);
        assert!(windows[0].ended_at.is_some());
        assert!(windows[1].ended_at.is_some());
        assert!(windows[2].ended_at.is_none());
        assert_eq!(windows[0].ended_at, Some(windows[1].started_at));
    }

    #[test]
    fn samples_are_sliced_by_phase_window() {
        let tracker = PhaseTracker::new();

        tracker.enter(RunPhase::Baseline);
        let baseline_sample = MetricSample::new(Utc::now(), ContentionCounters::default());
        std::thread::sleep(std::time::Duration::from_millis(5));

        tracker.enter(RunPhase::Running);
        let running_sample = MetricSample::new(Utc::now(), ContentionCounters::default());

        let samples = vec![baseline_sample, running_sample];

        let baseline = tracker.slice_samples(RunPhase::Baseline, &samples);
        assert_eq!(baseline, vec![baseline_sample]);

        let running = tracker.slice_samples(RunPhase::Running, &samples);
        assert_eq!(running, vec![running_sample]);

        assert!(tracker
            .slice_samples(RunPhase::PostCapture, &samples)
            .is_empty());
    }
}
