use tabled::Tabled;

use crate::ExecutionResult;

#[derive(Tabled)]
pub struct OperationRow {
    pub workload: String,
    pub avg_time_ms: String,
    pub min_time_ms: String,
    pub max_time_ms: String,
    pub total_operations: usize,
    pub total_duration_ms: String,
    pub failures: usize,
}

impl OperationRow {
    pub fn from_records(workload: String, records: &[ExecutionResult]) -> Self {
        let total_operations = records.len();
        let total_duration_micros = total_micros(records);
        let failures = records.iter().filter(|r| !r.succeeded).count();

        // Min/max only consider successful calls so that fast-failing errors don't mask the
        // latency picture. A workload that never succeeded shows 0.00 for both.
        let succeeded_micros = records
            .iter()
            .filter(|r| r.succeeded)
            .map(|r| r.duration_micros);
        let min_micros = succeeded_micros.clone().min().unwrap_or(0);
        let max_micros = succeeded_micros.max().unwrap_or(0);

        let avg_micros = if total_operations == 0 {
            0.0
        } else {
            total_duration_micros as f64 / total_operations as f64
        };

        Self {
            workload,
            avg_time_ms: float2(avg_micros / 1000.0),
            min_time_ms: float2(min_micros as f64 / 1000.0),
            max_time_ms: float2(max_micros as f64 / 1000.0),
            total_operations,
            total_duration_ms: float2(total_duration_micros as f64 / 1000.0),
            failures,
        }
    }
}

pub fn total_micros(records: &[ExecutionResult]) -> u128 {
    records.iter().map(|r| r.duration_micros as u128).sum()
}

fn float2(n: f64) -> String {
    format!("{:.2}", n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FailureKind;
    use chrono::Utc;
    use std::time::Duration;

    #[test]
    fn row_aggregates_count_and_duration_separately() {
        let records = vec![
            ExecutionResult::success("cheap", Utc::now(), Duration::from_micros(500)),
            ExecutionResult::success("cheap", Utc::now(), Duration::from_micros(1500)),
            ExecutionResult::failure(
                "cheap",
                Utc::now(),
                Duration::from_micros(100),
                FailureKind::Timeout,
            ),
        ];

        let row = OperationRow::from_records("cheap".to_string(), &records);

        assert_eq!(row.total_operations, 3);
        assert_eq!(row.failures, 1);
        assert_eq!(row.total_duration_ms, "2.10");
        assert_eq!(row.min_time_ms, "0.50");
        assert_eq!(row.max_time_ms, "1.50");
        assert_eq!(row.avg_time_ms, "0.70");
    }
}
