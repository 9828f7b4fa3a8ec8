use std::cmp::min;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use grindstone_core::prelude::{ShutdownHandle, ShutdownListener};
use grindstone_instruments::ResultLog;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::executor::QueryExecutor;
use crate::workload::WorkloadDefinition;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Consecutive failures of one workload before a warning is logged.
const PERSISTENT_FAILURE_STREAK: u32 = 5;

/// Drives the mixed victim traffic at a modest, human-realistic rate.
///
/// Each tick picks the next workload weighted-random, so the mix resembles production traffic
/// rather than a fixed rotation. Ticks are scheduled from absolute times: when the target slows
/// down, calls take longer but the runner keeps trying to hold its cadence. It must never
/// self-throttle, because unthrottled degradation is exactly what is being measured.
pub(crate) struct VictimRunner {
    workloads: Vec<WorkloadDefinition>,
    pacing: Duration,
    log: Arc<ResultLog>,
}

impl VictimRunner {
    pub(crate) fn new(
        workloads: Vec<WorkloadDefinition>,
        pacing: Duration,
        log: Arc<ResultLog>,
    ) -> Self {
        Self {
            workloads,
            pacing,
            log,
        }
    }

    pub(crate) fn start(
        self,
        query_executor: Arc<QueryExecutor>,
        stop: &ShutdownHandle,
    ) -> JoinHandle<()> {
        let mut listener = stop.new_listener();

        std::thread::Builder::new()
            .name("victim".to_string())
            .spawn(move || {
                let mut rng = StdRng::from_entropy();
                // Weights are validated as non-zero when the definition is built.
                let mix = WeightedIndex::new(self.workloads.iter().map(|w| w.weight()))
                    .expect("Victim workload weights must be non-zero");
                let mut streaks: HashMap<String, u32> = HashMap::new();

                let mut next_tick = Instant::now();
                loop {
                    if listener.should_shutdown() {
                        log::debug!("Stopping victim runner");
                        break;
                    }

                    let workload = &self.workloads[mix.sample(&mut rng)];
                    let params = workload.generate_params(&mut rng);
                    let result = query_executor.execute(workload, &params);

                    if result.succeeded {
                        streaks.remove(workload.name());
                    } else {
                        let streak = streaks.entry(workload.name().to_string()).or_insert(0);
                        *streak += 1;
                        if *streak == PERSISTENT_FAILURE_STREAK {
                            log::warn!(
                                "Victim workload {} has failed {} times in a row",
                                workload.name(),
                                streak
                            );
                        }
                    }
                    self.log.append(result);

                    // Next tick is scheduled from the previous one, not from when the call
                    // finished, so observed latency never feeds back into the pacing. If calls
                    // overrun the pacing the runner catches up rather than quietly slowing.
                    next_tick += self.pacing;
                    if sleep_until(next_tick, &mut listener) {
                        break;
                    }
                }
            })
            .expect("Failed to spawn victim runner thread")
    }
}

/// Sleep until `deadline`, polling the stop signal. Returns true if stopped first.
fn sleep_until(deadline: Instant, listener: &mut ShutdownListener) -> bool {
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
