use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use grindstone_runner::prelude::*;
use rand::Rng;
use tokio::sync::Semaphore;

/// An in-memory stand-in for the external database.
///
/// Calls sleep for a fixed latency on the shared runtime, optionally bounded by a connection
/// pool, with deterministic failure injection. The contention counters grow with the number of
/// calls served, so an attacked "target" shows inflated counters in the post window.
pub struct MockTarget {
    latency: Duration,
    /// Fail `0` of every `1` calls by default.
    failure_ratio: (u64, u64),
    pool: Option<Arc<Semaphore>>,
    pool_acquire_timeout: Duration,
    ping_fails: bool,
    probe_fails: bool,
    calls: AtomicU64,
    probes: AtomicU64,
}

impl MockTarget {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            failure_ratio: (0, 1),
            pool: None,
            pool_acquire_timeout: Duration::from_millis(5),
            ping_fails: false,
            probe_fails: false,
            calls: AtomicU64::new(0),
            probes: AtomicU64::new(0),
        }
    }

    /// Fail `fail` of every `of_every` calls, deterministically.
    pub fn with_failure_ratio(mut self, fail: u64, of_every: u64) -> Self {
        self.failure_ratio = (fail, of_every);
        self
    }

    /// Bound the target by a connection pool of `permits` connections shared by every caller.
    pub fn with_pool(mut self, permits: usize) -> Self {
        self.pool = Some(Arc::new(Semaphore::new(permits)));
        self
    }

    pub fn with_failing_ping(mut self) -> Self {
        self.ping_fails = true;
        self
    }

    pub fn with_failing_probe(mut self) -> Self {
        self.probe_fails = true;
        self
    }
}

impl QueryTarget for MockTarget {
    fn execute<'a>(
        &'a self,
        _statement: &'a str,
        _params: &'a [SqlValue],
    ) -> BoxFuture<'a, Result<u64, TargetError>> {
        Box::pin(async move {
            let _permit = match &self.pool {
                Some(pool) => {
                    match tokio::time::timeout(
                        self.pool_acquire_timeout,
                        pool.clone().acquire_owned(),
                    )
                    .await
                    {
                        Ok(Ok(permit)) => Some(permit),
                        _ => {
                            return Err(TargetError::new(
                                TargetErrorKind::ResourceExhausted,
                                "No connections available",
                            ))
                        }
                    }
                }
                None => None,
            };

            tokio::time::sleep(self.latency).await;

            let n = self.calls.fetch_add(1, Ordering::Relaxed);
            let (fail, of_every) = self.failure_ratio;
            if n % of_every < fail {
                return Err(TargetError::new(
                    TargetErrorKind::Execution,
                    "Injected failure",
                ));
            }
            Ok(1)
        })
    }

    fn ping(&self) -> BoxFuture<'_, Result<(), TargetError>> {
        Box::pin(async move {
            if self.ping_fails {
                return Err(TargetError::new(
                    TargetErrorKind::Unavailable,
                    "Connection refused",
                ));
            }
            Ok(())
        })
    }
}

impl ContentionProbe for MockTarget {
    fn sample(&self) -> BoxFuture<'_, Result<ContentionCounters, TargetError>> {
        Box::pin(async move {
            if self.probe_fails {
                return Err(TargetError::new(
                    TargetErrorKind::Unavailable,
                    "Probe offline",
                ));
            }
            let calls = self.calls.load(Ordering::Relaxed);
            let probes = self.probes.fetch_add(1, Ordering::Relaxed);
            Ok(ContentionCounters {
                signal_wait_ms: calls,
                total_wait_ms: calls * 2,
                runnable_tasks: 1,
                yields: probes,
            })
        })
    }
}

pub fn sample_run_args() -> RunArgs {
    RunArgs {
        connection_string: "mock://test".to_string(),
        attacker: "cheap_lookup".to_string(),
        victims: vec!["order_summary".to_string()],
        duration: Some(2),
        baseline: 1,
        sample_interval: 1,
        iterations: None,
        workers: 4,
        victim_pacing_ms: 50,
        failure_threshold: 0.5,
        high_frequency_threshold: 100,
        out: None,
        run_id: None,
        no_progress: true,
    }
}

pub fn sample_builder(args: RunArgs, target: Arc<MockTarget>) -> RunDefinitionBuilder {
    RunDefinitionBuilder::new("test_scenario", args)
        .use_target(target.clone())
        .use_probe(target)
        .register_workload(
            WorkloadDefinition::new("cheap_lookup", "SELECT available FROM seats WHERE seat_id = $1")
                .with_params(|rng| vec![SqlValue::Int(rng.gen_range(1..=100))])
                .with_timeout(Duration::from_millis(500)),
        )
        .register_workload(
            WorkloadDefinition::new(
                "order_summary",
                "SELECT order_id, SUM(amount) FROM order_lines WHERE customer_id = $1 GROUP BY order_id",
            )
            .with_params(|rng| vec![SqlValue::Int(rng.gen_range(1..=20))])
            .with_weight(3)
            .with_timeout(Duration::from_millis(500)),
        )
}
