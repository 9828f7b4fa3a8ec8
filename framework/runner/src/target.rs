use futures::future::BoxFuture;
use grindstone_instruments::{ContentionCounters, FailureKind};

/// A parameter value bound to a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetErrorKind {
    /// The connection pool or another shared resource was exhausted.
    ResourceExhausted,
    /// The target rejected or failed the statement.
    Execution,
    /// The target could not be reached at all.
    Unavailable,
}

#[derive(derive_more::Error, derive_more::Display, Debug)]
#[display("{kind:?}: {msg}")]
pub struct TargetError {
    kind: TargetErrorKind,
    msg: String,
}

impl TargetError {
    pub fn new(kind: TargetErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            msg: msg.into(),
        }
    }

    pub fn kind(&self) -> TargetErrorKind {
        self.kind
    }

    /// How this error is recorded on an [grindstone_instruments::ExecutionResult].
    pub fn failure_kind(&self) -> FailureKind {
        match self.kind {
            TargetErrorKind::ResourceExhausted => FailureKind::ResourceExhausted,
            TargetErrorKind::Execution | TargetErrorKind::Unavailable => FailureKind::Execution,
        }
    }
}

/// The query-execution interface of the external database.
///
/// The harness treats the target as a black box: one round-trip per call, no retries, and only
/// latency and success are measured. Implementations share one connection pool across every
/// worker; nobody gets exclusive access, and pool exhaustion must surface as a
/// [TargetErrorKind::ResourceExhausted] error rather than a panic or an indefinite block.
pub trait QueryTarget: Send + Sync {
    /// Execute one parameterized statement, returning the number of rows affected or returned.
    fn execute<'a>(
        &'a self,
        statement: &'a str,
        params: &'a [SqlValue],
    ) -> BoxFuture<'a, Result<u64, TargetError>>;

    /// Cheap connectivity check, used once during setup.
    fn ping(&self) -> BoxFuture<'_, Result<(), TargetError>>;
}

/// Reads the target's scheduler contention counters.
///
/// Kept separate from [QueryTarget] because the sampler runs on its own clock, independent of
/// the workload drivers, and a target used only for probing never needs the execution side.
pub trait ContentionProbe: Send + Sync {
    fn sample(&self) -> BoxFuture<'_, Result<ContentionCounters, TargetError>>;
}
