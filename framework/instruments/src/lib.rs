mod report;
mod results;
mod samples;

pub use report::{ReportCollector, ReportConfig, Reporter, SummaryReportCollector};
pub use results::{ExecutionResult, FailureKind, ResultLog};
pub use samples::{ContentionCounters, MetricSample, SampleLog};
