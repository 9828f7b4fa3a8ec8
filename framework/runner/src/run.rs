use std::cmp::min;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::Utc;
use grindstone_core::prelude::{SetupFailureError, ShutdownHandle, ShutdownListener};
use grindstone_instruments::{ReportConfig, ResultLog, SampleLog};
use grindstone_report_model::{
    append_report, build_comparison_report, ComparisonReport, RunDescriptor, RunFlag, RunStatus,
};

use crate::attacker::LoadDriver;
use crate::comparison::print_comparison;
use crate::definition::RunDefinitionBuilder;
use crate::executor::{Executor, QueryExecutor};
use crate::monitor::start_monitor;
use crate::phase::{PhaseTracker, RunPhase};
use crate::progress::start_progress;
use crate::sampler::MetricSampler;
use crate::shutdown::start_interrupt_listener;
use crate::victim::VictimRunner;
use crate::workload::ExecutionPolicy;

const SETUP_PING_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What a finished run hands back to the scenario.
#[derive(Debug)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub report: ComparisonReport,
}

/// Run the harness: baseline capture, concurrent attack and victim load, post capture,
/// comparison report.
///
/// This is the only place that sequences phases or signals cancellation. Every other actor
/// observes its stop signal cooperatively, within one loop iteration, and in-flight calls are
/// left to complete or time out naturally so no partial records are ever written.
pub fn run(definition: RunDefinitionBuilder) -> anyhow::Result<RunOutcome> {
    let definition = definition.build()?;

    log::info!("Running scenario: {}", definition.name);

    let phases = PhaseTracker::new();
    phases.enter(RunPhase::Setup);

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let interrupt_handle = start_interrupt_listener(&runtime);
    let executor = Arc::new(Executor::new(runtime, interrupt_handle.clone()));

    // Fail setup before any phase starts if the target cannot be reached at all.
    executor.execute_in_place(async {
        match tokio::time::timeout(SETUP_PING_TIMEOUT, definition.target.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(anyhow::Error::new(SetupFailureError::new(format!(
                "Cannot reach the target: {e}"
            )))),
            Err(_) => Err(anyhow::Error::new(SetupFailureError::new(
                "Timed out reaching the target",
            ))),
        }
    })?;

    let query_executor = Arc::new(QueryExecutor::new(executor.clone(), definition.target.clone()));
    let reporter = ReportConfig::default().enable_summary().init();

    let attacker_log = Arc::new(ResultLog::new());
    let victim_log = Arc::new(ResultLog::new());
    let sample_log = Arc::new(SampleLog::new());

    let mut interrupt_listener = interrupt_handle.new_listener();
    start_monitor(interrupt_handle.new_listener());

    // The sampler runs on its own clock from the start of the baseline until after the last
    // load phase, unaffected by anything the drivers do.
    let mut sampler = MetricSampler::new(
        definition.probe.clone(),
        executor.clone(),
        sample_log.clone(),
        Duration::from_secs(definition.sample_interval),
    );

    let started_at = Utc::now();

    phases.enter(RunPhase::Baseline);
    sampler.start()?;
    let mut interrupted = wait_for(
        Duration::from_secs(definition.baseline),
        &mut interrupt_listener,
    );

    let mut status = RunStatus::Completed;
    let mut flags = Vec::new();
    let mut running_secs = 0.0;

    if interrupted {
        status = RunStatus::Degraded;
    } else {
        phases.enter(RunPhase::Running);

        let drivers_handle = ShutdownHandle::new();
        if !definition.no_progress {
            start_progress(
                Duration::from_secs(definition.duration),
                drivers_handle.new_listener(),
            );
        }

        let unstable = Arc::new(AtomicBool::new(false));
        let budgeted = matches!(definition.attacker.policy(), ExecutionPolicy::Iterations(_));

        let driver = LoadDriver::new(
            definition.attacker.clone(),
            definition.workers,
            definition.failure_threshold,
            unstable.clone(),
            attacker_log.clone(),
        );
        let attacker_handles = driver.start(query_executor.clone(), &drivers_handle);

        let victim = VictimRunner::new(
            definition.victims.clone(),
            definition.victim_pacing,
            victim_log.clone(),
        );
        let victim_handle = victim.start(query_executor.clone(), &drivers_handle);

        let running_started = Instant::now();
        let deadline = running_started + Duration::from_secs(definition.duration);
        loop {
            if Instant::now() >= deadline {
                break;
            }
            if interrupt_listener.should_shutdown() {
                interrupted = true;
                status = RunStatus::Degraded;
                break;
            }
            if unstable.load(Ordering::Relaxed) {
                status = RunStatus::Degraded;
                flags.push(RunFlag::WorkloadUnstable);
                log::warn!("Attacker workload is unstable, draining early");
                break;
            }
            if budgeted && attacker_handles.iter().all(|h| h.is_finished()) {
                log::info!("Attacker iteration budget exhausted, draining");
                break;
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        phases.enter(RunPhase::Draining);
        drivers_handle.shutdown();
        for handle in attacker_handles {
            handle
                .join()
                .map_err(|e| anyhow::anyhow!("Error joining attacker worker thread: {:?}", e))?;
        }
        victim_handle
            .join()
            .map_err(|e| anyhow::anyhow!("Error joining victim runner thread: {:?}", e))?;
        running_secs = running_started.elapsed().as_secs_f64();
    }

    phases.enter(RunPhase::PostCapture);
    if !interrupted {
        // Give the sampler one tick with load stopped before the final sample.
        wait_for(
            Duration::from_secs(definition.sample_interval),
            &mut interrupt_listener,
        );
    }
    sampler.stop();

    phases.enter(RunPhase::Reporting);

    let samples = sample_log.samples();
    let baseline_samples = phases.slice_samples(RunPhase::Baseline, &samples);
    let post_samples = phases.slice_samples(RunPhase::PostCapture, &samples);

    // The drivers only ever run inside the Running window, so their logs are the running-phase
    // results; no per-record filtering is needed.
    let mut running_results = attacker_log.snapshot();
    let attacker_calls = running_results.len();
    running_results.extend(victim_log.snapshot());

    let achieved_attacker_rate = if running_secs > 0.0 {
        attacker_calls as f64 / running_secs
    } else {
        0.0
    };

    let descriptor = RunDescriptor {
        run_id: definition.run_id.clone(),
        scenario_name: definition.name.clone(),
        started_at: started_at.timestamp(),
        status,
        flags,
        attacker_workload: definition.attacker.name().to_string(),
        achieved_attacker_rate,
        run_duration: Some(definition.duration),
        sample_interval: definition.sample_interval,
        samples_collected: samples.len() as u64,
        unsampled_intervals: sample_log.gap_count() as u64,
    };

    let report = build_comparison_report(
        descriptor,
        &baseline_samples,
        &post_samples,
        &running_results,
        definition.high_frequency_threshold,
    )?;

    // The report file is written exactly once, here; never mid-run.
    if let Some(out) = &definition.out {
        append_report(&report, out.clone())
            .with_context(|| format!("Failed to write report to {}", out.display()))?;
        log::info!("Report appended to {}", out.display());
    }

    for record in &running_results {
        reporter.add_operation(record);
    }
    reporter.finalize();
    print_comparison(&report);

    phases.enter(RunPhase::Done);
    // Stops the monitor; everything else has already been joined.
    interrupt_handle.shutdown();

    Ok(RunOutcome { status, report })
}

/// Sleep for `window`, polling the interrupt signal. Returns true if interrupted first.
fn wait_for(window: Duration, listener: &mut ShutdownListener) -> bool {
    let deadline = Instant::now() + window;
    loop {
        if listener.should_shutdown() {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        std::thread::sleep(min(POLL_INTERVAL, deadline - now));
    }
}
