use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use grindstone_core::prelude::{ShutdownHandle, ShutdownSignalError};
use grindstone_instruments::{ExecutionResult, FailureKind};

use crate::target::{QueryTarget, SqlValue};
use crate::workload::WorkloadDefinition;

/// Runs async work from the harness's worker threads on one shared runtime.
///
/// Every driver and the sampler block on this same runtime, so all of them compete for the same
/// CPU budget. Giving each actor an isolated pool would defeat the contention this harness
/// exists to reproduce.
#[derive(Debug)]
pub struct Executor {
    runtime: tokio::runtime::Runtime,
    shutdown_handle: ShutdownHandle,
}

impl Executor {
    pub(crate) fn new(runtime: tokio::runtime::Runtime, shutdown_handle: ShutdownHandle) -> Self {
        Self {
            runtime,
            shutdown_handle,
        }
    }

    /// Run async code in place, blocking until it completes or the run is interrupted.
    ///
    /// The future is cancelled if the interrupt signal fires, so this is only suitable for
    /// setup-time work. Measured query calls go through [QueryExecutor::execute] instead, which
    /// never cancels an in-flight call.
    pub fn execute_in_place<T>(
        &self,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        let mut shutdown_listener = self.shutdown_handle.new_listener();
        self.runtime.block_on(async move {
            tokio::select! {
                result = fut => result,
                _ = shutdown_listener.wait_for_shutdown() => {
                    Err(anyhow::anyhow!(ShutdownSignalError::default()))
                },
            }
        })
    }

    /// Submit async code to be run in the background.
    ///
    /// The future is not cancelled on shutdown and the runner does not wait for it before
    /// exiting.
    pub fn spawn(&self, fut: impl Future<Output = ()> + Send + 'static) {
        self.runtime.spawn(fut);
    }

    /// Block on a future with no interrupt race. The caller is responsible for the future being
    /// bounded, e.g. by a timeout.
    pub(crate) fn block_on<T>(&self, fut: impl Future<Output = T>) -> T {
        self.runtime.block_on(fut)
    }
}

/// Executes single workload calls against the target and turns each one into an
/// [ExecutionResult].
///
/// Intentionally dumb and fast: one round-trip, no retries, no backoff. Retrying is a caller
/// decision; this component mirrors the premise under test, that each call is individually
/// cheap.
pub struct QueryExecutor {
    executor: Arc<Executor>,
    target: Arc<dyn QueryTarget>,
}

impl QueryExecutor {
    pub fn new(executor: Arc<Executor>, target: Arc<dyn QueryTarget>) -> Self {
        Self { executor, target }
    }

    /// Execute one call of `workload` with the given bound parameters.
    ///
    /// Always returns within the workload's timeout plus scheduling overhead. A timed-out call
    /// is recorded with [FailureKind::Timeout]; the result record is complete either way, never
    /// torn by cancellation.
    pub fn execute(&self, workload: &WorkloadDefinition, params: &[SqlValue]) -> ExecutionResult {
        let started_at = Utc::now();
        let started = Instant::now();

        let outcome = self.executor.block_on(async {
            tokio::time::timeout(
                workload.timeout(),
                self.target.execute(workload.statement(), params),
            )
            .await
        });

        match outcome {
            Ok(Ok(_rows)) => ExecutionResult::success(workload.name(), started_at, started.elapsed()),
            Ok(Err(e)) => {
                log::debug!("Workload {} call failed: {}", workload.name(), e);
                ExecutionResult::failure(
                    workload.name(),
                    started_at,
                    started.elapsed(),
                    e.failure_kind(),
                )
            }
            Err(_) => ExecutionResult::failure(
                workload.name(),
                started_at,
                started.elapsed(),
                FailureKind::Timeout,
            ),
        }
    }
}
