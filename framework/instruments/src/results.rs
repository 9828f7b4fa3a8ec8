use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Why a single query execution failed.
///
/// Per-call failures are data, not errors. They are recorded on the result and the run carries
/// on; only sustained failure patterns escalate to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The call exceeded its deadline.
    Timeout,
    /// The connection pool or another shared resource was exhausted.
    ResourceExhausted,
    /// The target rejected or failed the statement.
    Execution,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::ResourceExhausted => write!(f, "resource-exhausted"),
            FailureKind::Execution => write!(f, "execution"),
        }
    }
}

/// The outcome of one query execution.
///
/// Created once per call and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub workload: String,
    pub started_at: DateTime<Utc>,
    pub duration_micros: u64,
    pub succeeded: bool,
    pub failure: Option<FailureKind>,
}

impl ExecutionResult {
    pub fn success(workload: &str, started_at: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            workload: workload.to_string(),
            started_at,
            duration_micros: duration.as_micros() as u64,
            succeeded: true,
            failure: None,
        }
    }

    pub fn failure(
        workload: &str,
        started_at: DateTime<Utc>,
        duration: Duration,
        kind: FailureKind,
    ) -> Self {
        Self {
            workload: workload.to_string(),
            started_at,
            duration_micros: duration.as_micros() as u64,
            succeeded: false,
            failure: Some(kind),
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_micros(self.duration_micros)
    }
}

/// An append-only, thread-safe log of execution results.
///
/// Each component that produces results owns its own log; logs are only merged at report time.
/// Keeping one log per component means the hot path takes an uncontended lock rather than one
/// shared across every worker, which would itself distort the contention being measured.
#[derive(Debug, Default)]
pub struct ResultLog {
    records: Mutex<Vec<ExecutionResult>>,
}

impl ResultLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, record: ExecutionResult) {
        self.records.lock().push(record);
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Clone out the records collected so far, in append order.
    pub fn snapshot(&self) -> Vec<ExecutionResult> {
        self.records.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_keep_append_order() {
        let log = ResultLog::new();
        for i in 0..5u64 {
            log.append(ExecutionResult::success(
                "probe",
                Utc::now(),
                Duration::from_micros(i),
            ));
        }

        let snapshot = log.snapshot();
        assert_eq!(snapshot.len(), 5);
        let durations: Vec<_> = snapshot.iter().map(|r| r.duration_micros).collect();
        assert_eq!(durations, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn failure_records_carry_their_kind() {
        let record = ExecutionResult::failure(
            "probe",
            Utc::now(),
            Duration::from_millis(30),
            FailureKind::Timeout,
        );

        assert!(!record.succeeded);
        assert_eq!(record.failure, Some(FailureKind::Timeout));
        assert_eq!(record.duration(), Duration::from_millis(30));
    }
}
