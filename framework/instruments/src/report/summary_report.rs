mod operations_table;

use std::collections::HashMap;

use tabled::settings::Style;
use tabled::Table;

use crate::report::summary_report::operations_table::OperationRow;
use crate::report::ReportCollector;
use crate::ExecutionResult;

/// Keeps the merged execution results in memory and prints a per-workload summary table when the
/// run finishes.
pub struct SummaryReportCollector {
    records: Vec<ExecutionResult>,
}

impl Default for SummaryReportCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl SummaryReportCollector {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    fn print_summary_of_operations(&self) {
        println!("\nSummary of operations");

        let mut groups = self
            .records
            .iter()
            .fold(HashMap::new(), |mut acc, record| {
                acc.entry(record.workload.clone())
                    .or_insert_with(Vec::new)
                    .push(record.clone());
                acc
            })
            .into_iter()
            .collect::<Vec<_>>();

        // Heaviest aggregate consumers first.
        groups.sort_by_key(|(_, records)| std::cmp::Reverse(operations_table::total_micros(records)));

        let rows = groups
            .into_iter()
            .map(|(workload, records)| OperationRow::from_records(workload, &records))
            .collect::<Vec<_>>();

        let mut table = Table::new(&rows);
        table.with(Style::modern());

        println!("{table}");
    }
}

impl ReportCollector for SummaryReportCollector {
    fn add_operation(&mut self, record: &ExecutionResult) {
        self.records.push(record.clone());
    }

    fn finalize(&self) {
        self.print_summary_of_operations();
    }
}
