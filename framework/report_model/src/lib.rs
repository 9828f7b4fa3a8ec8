use std::collections::HashMap;
use std::io::{BufRead, Read, Write};
use std::path::PathBuf;

use grindstone_core::prelude::MissingBaselineError;
use grindstone_instruments::{ExecutionResult, MetricSample};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha3::Digest;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Every phase ran to its configured end.
    Completed,
    /// The run was cut short but still produced comparable data.
    Degraded,
}

/// Conditions surfaced during the run that a reader of the report should know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunFlag {
    /// The attacker's failure rate crossed the configured threshold and load was drained early.
    WorkloadUnstable,
}

/// One tracked metric compared between the baseline and post-capture windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDelta {
    pub metric: String,
    pub baseline: f64,
    pub post: f64,
    pub delta: f64,
    /// `None` when the baseline value is zero, since the change is not expressible as a
    /// percentage of nothing.
    pub percent_change: Option<f64>,
}

/// Aggregate resource consumption of one workload across the running phase.
///
/// Count, total duration and average duration are always carried side by side. Collapsing them
/// into one score would hide exactly the effect this harness exists to show: a per-call-cheap
/// workload with an enormous aggregate footprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadImpact {
    pub workload: String,
    pub calls: u64,
    pub failures: u64,
    pub total_duration_micros: u64,
    pub avg_duration_micros: f64,
    /// Set when `calls` exceeds the configured high-frequency threshold, marking the workload as
    /// a candidate root cause.
    pub high_frequency: bool,
}

/// Identity and outcome of the run being reported on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDescriptor {
    /// The unique run id, chosen by the runner.
    pub run_id: String,
    pub scenario_name: String,
    /// Unix timestamp in seconds of when the run started.
    pub started_at: i64,
    pub status: RunStatus,
    pub flags: Vec<RunFlag>,
    pub attacker_workload: String,
    /// The rate the attacker actually sustained over the running phase, in calls per second.
    ///
    /// This is the real experimental variable. If the target could not keep up with the
    /// requested load, this is what was achieved, not what was asked for.
    pub achieved_attacker_rate: f64,
    /// The configured run duration in seconds, if the run was time bounded.
    pub run_duration: Option<u64>,
    pub sample_interval: u64,
    /// Samples captured across the whole run, all phases included.
    pub samples_collected: u64,
    /// Ticks on which the sampler could not read the counters.
    pub unsampled_intervals: u64,
}

/// The baseline-vs-post comparison produced once at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    #[serde(flatten)]
    pub run: RunDescriptor,
    pub metric_deltas: Vec<MetricDelta>,
    pub workload_impacts: Vec<WorkloadImpact>,
}

impl ComparisonReport {
    /// Compute a fingerprint for the configuration that produced this report.
    ///
    /// Reports from repeated runs of the same configuration share a fingerprint, so stored
    /// report lines can be grouped for trend analysis. It uses the
    ///     - Scenario name
    ///     - Attacker workload name
    ///     - Sorted workload names
    ///     - Run duration and sample interval
    ///     - Grindstone version
    ///
    /// The fingerprint is computed using [sha3::Sha3_256].
    pub fn fingerprint(&self) -> String {
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, self.run.scenario_name.as_bytes());
        Digest::update(&mut hasher, self.run.attacker_workload.as_bytes());
        self.workload_impacts
            .iter()
            .map(|impact| impact.workload.as_str())
            .sorted()
            .for_each(|name| {
                Digest::update(&mut hasher, name.as_bytes());
            });
        if let Some(run_duration) = self.run.run_duration {
            Digest::update(&mut hasher, run_duration.to_le_bytes());
        }
        Digest::update(&mut hasher, self.run.sample_interval.to_le_bytes());
        Digest::update(&mut hasher, env!("CARGO_PKG_VERSION").as_bytes());

        format!("{:x}", hasher.finalize())
    }
}

/// Percentage change from `baseline` to `post`, or `None` when the baseline is zero.
pub fn percent_change(baseline: f64, post: f64) -> Option<f64> {
    if baseline == 0.0 {
        None
    } else {
        Some(100.0 * (post - baseline) / baseline)
    }
}

/// Build the comparison report.
///
/// This is a pure function over the captured data: the same inputs always produce the same
/// report. The runner slices the sample stream by phase window before calling this; `baseline`
/// and `post` hold only the samples inside their respective windows and `running_results` holds
/// only results recorded during the running phase.
///
/// Fails with [MissingBaselineError] when either window has no samples, since there is nothing
/// to compare.
pub fn build_comparison_report(
    run: RunDescriptor,
    baseline: &[MetricSample],
    post: &[MetricSample],
    running_results: &[ExecutionResult],
    high_frequency_threshold: u64,
) -> Result<ComparisonReport, MissingBaselineError> {
    let baseline_sample = baseline
        .last()
        .ok_or_else(|| MissingBaselineError::new("baseline"))?;
    let post_sample = post
        .last()
        .ok_or_else(|| MissingBaselineError::new("post-capture"))?;

    let metric_deltas = vec![
        metric_delta(
            "signal_wait_ms",
            baseline_sample.signal_wait_ms,
            post_sample.signal_wait_ms,
        ),
        metric_delta(
            "total_wait_ms",
            baseline_sample.total_wait_ms,
            post_sample.total_wait_ms,
        ),
        metric_delta(
            "runnable_tasks",
            baseline_sample.runnable_tasks,
            post_sample.runnable_tasks,
        ),
        metric_delta("yields", baseline_sample.yields, post_sample.yields),
    ];

    let workload_impacts = rank_workloads(running_results, high_frequency_threshold);

    Ok(ComparisonReport {
        run,
        metric_deltas,
        workload_impacts,
    })
}

fn metric_delta(metric: &str, baseline: u64, post: u64) -> MetricDelta {
    let baseline = baseline as f64;
    let post = post as f64;
    MetricDelta {
        metric: metric.to_string(),
        baseline,
        post,
        delta: post - baseline,
        percent_change: percent_change(baseline, post),
    }
}

fn rank_workloads(results: &[ExecutionResult], high_frequency_threshold: u64) -> Vec<WorkloadImpact> {
    let by_workload: HashMap<&str, Vec<&ExecutionResult>> = results
        .iter()
        .map(|result| (result.workload.as_str(), result))
        .into_group_map();

    by_workload
        .into_iter()
        .map(|(workload, records)| {
            let calls = records.len() as u64;
            let failures = records.iter().filter(|r| !r.succeeded).count() as u64;
            let total_duration_micros = records.iter().map(|r| r.duration_micros).sum::<u64>();

            WorkloadImpact {
                workload: workload.to_string(),
                calls,
                failures,
                total_duration_micros,
                avg_duration_micros: total_duration_micros as f64 / calls as f64,
                high_frequency: calls > high_frequency_threshold,
            }
        })
        .sorted_by(|a, b| {
            b.total_duration_micros
                .cmp(&a.total_duration_micros)
                .then_with(|| a.workload.cmp(&b.workload))
        })
        .collect()
}

/// Append the report to a file
///
/// The report will be serialized to JSON and output as a single line followed by a newline. The
/// recommended file extension is `.jsonl`.
pub fn append_report(report: &ComparisonReport, path: PathBuf) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    store_report(report, &mut file)?;
    let _ = file.write("\n".as_bytes())?;
    Ok(())
}

/// Serialize the report to a writer
pub fn store_report<W: Write>(report: &ComparisonReport, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, report)?;
    Ok(())
}

/// Load a report from a reader
pub fn load_report<R: Read>(reader: R) -> anyhow::Result<ComparisonReport> {
    let reader = std::io::BufReader::new(reader);
    let report: ComparisonReport = serde_json::from_reader(reader)?;
    Ok(report)
}

/// Load reports from a file
///
/// The file should contain one JSON object per line. This is the format produced by
/// [append_report].
pub fn load_reports(path: PathBuf) -> anyhow::Result<Vec<ComparisonReport>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut reports = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let report: ComparisonReport = serde_json::from_str(&line)?;
        reports.push(report);
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use grindstone_instruments::{ContentionCounters, FailureKind, SampleLog};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn sample(signal_wait_ms: u64) -> MetricSample {
        MetricSample::new(
            Utc::now(),
            ContentionCounters {
                signal_wait_ms,
                total_wait_ms: signal_wait_ms * 2,
                runnable_tasks: 1,
                yields: 10,
            },
        )
    }

    fn descriptor() -> RunDescriptor {
        RunDescriptor {
            run_id: "test-run".to_string(),
            scenario_name: "unit".to_string(),
            started_at: 1_700_000_000,
            status: RunStatus::Completed,
            flags: vec![],
            attacker_workload: "cheap_lookup".to_string(),
            achieved_attacker_rate: 1200.0,
            run_duration: Some(60),
            sample_interval: 2,
            samples_collected: 32,
            unsampled_intervals: 0,
        }
    }

    fn results(workload: &str, count: usize, each_micros: u64) -> Vec<ExecutionResult> {
        (0..count)
            .map(|_| {
                ExecutionResult::success(workload, Utc::now(), Duration::from_micros(each_micros))
            })
            .collect()
    }

    #[test]
    fn signal_wait_degradation_is_reported_as_delta_and_percent() {
        let report = build_comparison_report(
            descriptor(),
            &[sample(100)],
            &[sample(5000)],
            &[],
            1000,
        )
        .unwrap();

        let signal_wait = report
            .metric_deltas
            .iter()
            .find(|d| d.metric == "signal_wait_ms")
            .unwrap();
        assert_eq!(signal_wait.baseline, 100.0);
        assert_eq!(signal_wait.post, 5000.0);
        assert_eq!(signal_wait.delta, 4900.0);
        assert_eq!(signal_wait.percent_change, Some(4900.0));
    }

    #[test]
    fn percent_change_is_none_for_a_zero_baseline() {
        assert_eq!(percent_change(0.0, 50.0), None);
        assert_eq!(percent_change(200.0, 300.0), Some(50.0));

        let report = build_comparison_report(
            descriptor(),
            &[sample(0)],
            &[sample(70)],
            &[],
            1000,
        )
        .unwrap();
        let signal_wait = report
            .metric_deltas
            .iter()
            .find(|d| d.metric == "signal_wait_ms")
            .unwrap();
        assert_eq!(signal_wait.percent_change, None);
        assert_eq!(signal_wait.delta, 70.0);
    }

    #[test]
    fn building_twice_over_the_same_data_is_identical() {
        let baseline = [sample(100), sample(120)];
        let post = [sample(4000), sample(5000)];
        let running = results("cheap_lookup", 50, 800);

        let first =
            build_comparison_report(descriptor(), &baseline, &post, &running, 1000).unwrap();
        let second =
            build_comparison_report(descriptor(), &baseline, &post, &running, 1000).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn an_empty_window_fails_with_missing_baseline() {
        let err = build_comparison_report(descriptor(), &[], &[sample(10)], &[], 1000)
            .err()
            .unwrap();
        assert!(err.to_string().contains("baseline"));

        let err = build_comparison_report(descriptor(), &[sample(10)], &[], &[], 1000)
            .err()
            .unwrap();
        assert!(err.to_string().contains("post-capture"));
    }

    #[test]
    fn cheap_but_frequent_workload_ranks_above_slow_but_rare() {
        // 10,000 calls at 500us dominates 20 calls at 50ms in aggregate, even though each
        // individual call is two orders of magnitude cheaper.
        let mut running = results("cheap_lookup", 10_000, 500);
        running.extend(results("order_summary", 20, 50_000));

        let report =
            build_comparison_report(descriptor(), &[sample(1)], &[sample(2)], &running, 1000)
                .unwrap();

        assert_eq!(report.workload_impacts.len(), 2);
        let top = &report.workload_impacts[0];
        assert_eq!(top.workload, "cheap_lookup");
        assert_eq!(top.calls, 10_000);
        assert_eq!(top.total_duration_micros, 5_000_000);
        assert_eq!(top.avg_duration_micros, 500.0);
        assert!(top.high_frequency);

        let victim = &report.workload_impacts[1];
        assert_eq!(victim.workload, "order_summary");
        assert_eq!(victim.calls, 20);
        assert_eq!(victim.total_duration_micros, 1_000_000);
        assert!(!victim.high_frequency);
    }

    #[test]
    fn victim_degradation_shows_as_duration_growth_with_stable_count() {
        // Same 20 calls to the victim in both runs; only latency differs. The impact rows must
        // make it visible that the degradation is latency-driven, not volume-driven.
        let quiet = results("order_summary", 20, 51_000);
        let contended = results("order_summary", 20, 300_000);

        let quiet_report =
            build_comparison_report(descriptor(), &[sample(1)], &[sample(2)], &quiet, 1000)
                .unwrap();
        let contended_report =
            build_comparison_report(descriptor(), &[sample(1)], &[sample(2)], &contended, 1000)
                .unwrap();

        let before = &quiet_report.workload_impacts[0];
        let after = &contended_report.workload_impacts[0];

        assert_eq!(before.calls, after.calls);
        assert_eq!(before.avg_duration_micros, 51_000.0);
        assert_eq!(after.avg_duration_micros, 300_000.0);
        assert!(after.total_duration_micros > 5 * before.total_duration_micros);
    }

    #[test]
    fn failures_are_counted_per_workload() {
        let mut running = results("order_insert", 8, 2_000);
        running.push(ExecutionResult::failure(
            "order_insert",
            Utc::now(),
            Duration::from_micros(900),
            FailureKind::Execution,
        ));

        let report =
            build_comparison_report(descriptor(), &[sample(1)], &[sample(2)], &running, 1000)
                .unwrap();

        assert_eq!(report.workload_impacts[0].calls, 9);
        assert_eq!(report.workload_impacts[0].failures, 1);
    }

    #[test]
    fn report_round_trips_through_the_jsonl_file_format() {
        let log = SampleLog::new();
        log.record(ContentionCounters::default());
        let report = build_comparison_report(
            descriptor(),
            &log.samples(),
            &log.samples(),
            &results("cheap_lookup", 3, 100),
            1000,
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports.jsonl");
        append_report(&report, path.clone()).unwrap();
        append_report(&report, path.clone()).unwrap();

        let loaded = load_reports(path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], report);
        assert_eq!(loaded[0].fingerprint(), report.fingerprint());
    }
}
