use grindstone_report_model::ComparisonReport;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct DeltaRow {
    metric: String,
    baseline: String,
    post: String,
    delta: String,
    percent_change: String,
}

#[derive(Tabled)]
struct ImpactRow {
    workload: String,
    calls: u64,
    avg_time_ms: String,
    total_duration_ms: String,
    failures: u64,
    high_frequency: bool,
}

/// Print the comparison to stdout: the metric deltas between the baseline and post-capture
/// windows, then the workloads ranked by aggregate time.
pub(crate) fn print_comparison(report: &ComparisonReport) {
    println!("\nBaseline vs post-attack");
    let delta_rows = report
        .metric_deltas
        .iter()
        .map(|d| DeltaRow {
            metric: d.metric.clone(),
            baseline: float2(d.baseline),
            post: float2(d.post),
            delta: float2(d.delta),
            percent_change: match d.percent_change {
                Some(pct) => format!("{pct:.1}%"),
                None => "n/a".to_string(),
            },
        })
        .collect::<Vec<_>>();
    let mut table = Table::new(&delta_rows);
    table.with(Style::modern());
    println!("{table}");

    println!("\nWorkloads by aggregate time");
    let impact_rows = report
        .workload_impacts
        .iter()
        .map(|impact| ImpactRow {
            workload: impact.workload.clone(),
            calls: impact.calls,
            avg_time_ms: float2(impact.avg_duration_micros / 1000.0),
            total_duration_ms: float2(impact.total_duration_micros as f64 / 1000.0),
            failures: impact.failures,
            high_frequency: impact.high_frequency,
        })
        .collect::<Vec<_>>();
    let mut table = Table::new(&impact_rows);
    table.with(Style::modern());
    println!("{table}");

    println!(
        "\nRun {} finished {:?}; attacker {} achieved {:.1} calls/s; {} unsampled intervals",
        report.run.run_id,
        report.run.status,
        report.run.attacker_workload,
        report.run.achieved_attacker_rate,
        report.run.unsampled_intervals,
    );
}

fn float2(n: f64) -> String {
    format!("{:.2}", n)
}
