/// The run could not be started.
///
/// Raised before any measurement phase begins, for example when the target cannot be reached or
/// the configuration is invalid. Nothing is recorded and no report is written for a run that
/// fails setup.
#[derive(derive_more::Error, derive_more::Display, Debug)]
#[display("Setup failed: {msg}")]
pub struct SetupFailureError {
    msg: String,
}

impl SetupFailureError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

/// A comparison report could not be built because a measurement window holds no samples.
///
/// This is fatal to reporting only. The run itself may have completed; there is just nothing to
/// compare against.
#[derive(derive_more::Error, derive_more::Display, Debug)]
#[display("No samples were captured during the {window} window")]
pub struct MissingBaselineError {
    window: String,
}

impl MissingBaselineError {
    pub fn new(window: impl Into<String>) -> Self {
        Self {
            window: window.into(),
        }
    }
}

/// The attacker workload's failure rate crossed the configured threshold.
///
/// Surfaced by the load driver so that the orchestrator can drain early and mark the run as
/// degraded. A degraded run still produces a report from the data collected so far.
#[derive(derive_more::Error, derive_more::Display, Debug)]
#[display("Workload {workload} is unstable: {failed} of {total} calls failed")]
pub struct WorkloadUnstableError {
    workload: String,
    failed: u64,
    total: u64,
}

impl WorkloadUnstableError {
    pub fn new(workload: impl Into<String>, failed: u64, total: u64) -> Self {
        Self {
            workload: workload.into(),
            failed,
            total,
        }
    }
}
