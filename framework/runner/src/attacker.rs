use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use grindstone_core::prelude::{ShutdownHandle, WorkloadUnstableError};
use grindstone_instruments::ResultLog;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::executor::QueryExecutor;
use crate::workload::{ExecutionPolicy, WorkloadDefinition};

/// Failure-rate checks only kick in after this many calls, so a couple of early errors on a
/// cold target don't condemn the whole run.
const MIN_CALLS_FOR_INSTABILITY: u64 = 50;

#[derive(Debug, Default)]
pub(crate) struct DriverStats {
    successes: AtomicU64,
    failures: AtomicU64,
}

impl DriverStats {
    fn record(&self, succeeded: bool) {
        if succeeded {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn totals(&self) -> (u64, u64) {
        (
            self.failures.load(Ordering::Relaxed),
            self.successes.load(Ordering::Relaxed) + self.failures.load(Ordering::Relaxed),
        )
    }
}

/// Drives one workload at the highest rate the target will sustain.
///
/// A pool of workers, each in a tight loop. There is no pacing and no throttling on purpose:
/// if the target applies backpressure, the workers simply run at whatever rate is achievable
/// and the report carries the achieved rate, which is the real experimental variable.
pub(crate) struct LoadDriver {
    workload: WorkloadDefinition,
    workers: usize,
    failure_threshold: f64,
    unstable: Arc<AtomicBool>,
    stats: Arc<DriverStats>,
    log: Arc<ResultLog>,
}

impl LoadDriver {
    pub(crate) fn new(
        workload: WorkloadDefinition,
        workers: usize,
        failure_threshold: f64,
        unstable: Arc<AtomicBool>,
        log: Arc<ResultLog>,
    ) -> Self {
        Self {
            workload,
            workers,
            failure_threshold,
            unstable,
            stats: Arc::new(DriverStats::default()),
            log,
        }
    }

    pub(crate) fn start(
        &self,
        query_executor: Arc<QueryExecutor>,
        stop: &ShutdownHandle,
    ) -> Vec<JoinHandle<()>> {
        let budget = match self.workload.policy() {
            ExecutionPolicy::Iterations(total) => Some(Arc::new(AtomicU64::new(total))),
            ExecutionPolicy::Sustained => None,
        };

        let mut handles = Vec::with_capacity(self.workers);
        for worker_index in 0..self.workers {
            let workload = self.workload.clone();
            let query_executor = query_executor.clone();
            let budget = budget.clone();
            let unstable = self.unstable.clone();
            let stats = self.stats.clone();
            let log = self.log.clone();
            let failure_threshold = self.failure_threshold;
            let mut listener = stop.new_listener();

            let handle = std::thread::Builder::new()
                .name(format!("attacker-{worker_index}"))
                .spawn(move || {
                    let mut rng = StdRng::from_entropy();

                    loop {
                        if listener.should_shutdown() {
                            log::debug!("Stopping attacker worker {worker_index}");
                            break;
                        }
                        if unstable.load(Ordering::Relaxed) {
                            break;
                        }
                        // Claim an iteration before executing so the budget is honoured
                        // exactly across workers.
                        if let Some(budget) = &budget {
                            let claimed = budget
                                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                                    remaining.checked_sub(1)
                                })
                                .is_ok();
                            if !claimed {
                                break;
                            }
                        }

                        let params = workload.generate_params(&mut rng);
                        let result = query_executor.execute(&workload, &params);
                        stats.record(result.succeeded);
                        log.append(result);

                        let (failed, total) = stats.totals();
                        if total >= MIN_CALLS_FOR_INSTABILITY
                            && failed as f64 / total as f64 > failure_threshold
                            && !unstable.swap(true, Ordering::SeqCst)
                        {
                            // Surface the condition; the orchestrator decides to drain. The
                            // driver never aborts the process itself.
                            log::error!(
                                "{}",
                                WorkloadUnstableError::new(workload.name(), failed, total)
                            );
                        }
                    }
                })
                .expect("Failed to spawn attacker worker thread");

            handles.push(handle);
        }

        handles
    }
}
