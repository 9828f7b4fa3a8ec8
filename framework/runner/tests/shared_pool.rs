mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{sample_builder, sample_run_args, MockTarget};
use grindstone_runner::prelude::*;

/// The contention effect only reproduces when the attacker and the victim genuinely compete
/// for the same bounded resources. Both drivers here share one target with a two-connection
/// pool; exhaustion must show up as ordinary recorded failures on both sides, never as a fatal
/// error.
#[test]
fn attacker_and_victim_compete_for_the_same_bounded_pool() {
    let mut args = sample_run_args();
    args.workers = 6;
    args.victim_pacing_ms = 10;
    // Exhaustion is expected here; a failure rate of 1.0 keeps the instability drain out of
    // the picture so the run exercises the full window.
    args.failure_threshold = 1.0;

    let target = Arc::new(MockTarget::new(Duration::from_millis(30)).with_pool(2));
    let outcome = run(sample_builder(args, target)).unwrap();

    // Pool exhaustion is an ordinary result, not a run failure.
    assert_eq!(outcome.status, RunStatus::Completed);
    assert!(outcome.report.run.flags.is_empty());

    let attacker = outcome
        .report
        .workload_impacts
        .iter()
        .find(|impact| impact.workload == "cheap_lookup")
        .expect("Attacker workload missing from the report");
    let victim = outcome
        .report
        .workload_impacts
        .iter()
        .find(|impact| impact.workload == "order_summary")
        .expect("Victim workload missing from the report");

    // Six attacker workers against two connections cannot all get through.
    assert!(attacker.failures > 0);
    // The victim ran against the same pool and recorded its own calls.
    assert!(victim.calls > 0);
}
