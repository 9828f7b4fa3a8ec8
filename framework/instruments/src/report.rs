mod summary_report;

use parking_lot::Mutex;

use crate::ExecutionResult;

pub use summary_report::SummaryReportCollector;

/// A sink for execution results at the end of a run.
///
/// Collectors are fed the merged result logs once, during the reporting phase, and then
/// finalized. Nothing is streamed to a collector while load is being generated.
pub trait ReportCollector {
    fn add_operation(&mut self, record: &ExecutionResult);

    fn finalize(&self);
}

/// Configuration for the reporting done at the end of a run.
#[derive(Debug, Default)]
pub struct ReportConfig {
    summary: bool,
}

impl ReportConfig {
    /// Print a per-workload summary table to stdout when the run finishes.
    pub fn enable_summary(mut self) -> Self {
        self.summary = true;
        self
    }

    pub fn init(self) -> Reporter {
        let mut collectors: Vec<Box<dyn ReportCollector + Send>> = Vec::new();
        if self.summary {
            collectors.push(Box::new(SummaryReportCollector::new()));
        }

        Reporter {
            collectors: Mutex::new(collectors),
        }
    }
}

pub struct Reporter {
    collectors: Mutex<Vec<Box<dyn ReportCollector + Send>>>,
}

impl Reporter {
    pub fn add_operation(&self, record: &ExecutionResult) {
        for collector in self.collectors.lock().iter_mut() {
            collector.add_operation(record);
        }
    }

    pub fn finalize(&self) {
        for collector in self.collectors.lock().iter() {
            collector.finalize();
        }
    }
}
