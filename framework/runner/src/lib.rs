mod attacker;
mod cli;
mod comparison;
mod definition;
mod executor;
mod init;
mod monitor;
mod phase;
mod progress;
mod run;
mod sampler;
mod shutdown;
mod target;
mod types;
mod victim;
mod workload;

pub mod prelude {
    pub use crate::cli::{HarnessCli, HarnessCommand, RunArgs};
    pub use crate::definition::RunDefinitionBuilder;
    pub use crate::executor::{Executor, QueryExecutor};
    pub use crate::init::init;
    pub use crate::phase::{RunPhase, RunPhaseWindow};
    pub use crate::run::{run, RunOutcome};
    pub use crate::target::{
        ContentionProbe, QueryTarget, SqlValue, TargetError, TargetErrorKind,
    };
    pub use crate::types::HarnessResult;
    pub use crate::workload::{ExecutionPolicy, WorkloadDefinition};

    pub use grindstone_core::prelude::*;
    pub use grindstone_instruments::{ContentionCounters, ExecutionResult, FailureKind};
    pub use grindstone_report_model::{ComparisonReport, RunFlag, RunStatus};
}
