use std::cmp::min;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use grindstone_core::prelude::{ShutdownHandle, ShutdownListener};
use grindstone_instruments::SampleLog;

use crate::executor::Executor;
use crate::target::ContentionProbe;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SamplerState {
    Idle,
    Sampling,
    Stopped,
}

/// Polls the contention counters on a fixed interval for the whole run.
///
/// The sampler is its own actor with its own timer. It must not be driven by workload events:
/// if sampling rode along with the drivers, the contention they generate would perturb the very
/// measurement meant to detect it. Ticks are scheduled from the start instant, so a slow probe
/// read delays one sample without shifting the cadence.
pub(crate) struct MetricSampler {
    probe: Arc<dyn ContentionProbe>,
    executor: Arc<Executor>,
    log: Arc<SampleLog>,
    interval: Duration,
    state: SamplerState,
    stop_handle: ShutdownHandle,
    thread: Option<JoinHandle<()>>,
}

impl MetricSampler {
    pub(crate) fn new(
        probe: Arc<dyn ContentionProbe>,
        executor: Arc<Executor>,
        log: Arc<SampleLog>,
        interval: Duration,
    ) -> Self {
        Self {
            probe,
            executor,
            log,
            interval,
            state: SamplerState::Idle,
            stop_handle: ShutdownHandle::new(),
            thread: None,
        }
    }

    /// Idle → Sampling. Takes one sample immediately, then one per interval.
    pub(crate) fn start(&mut self) -> anyhow::Result<()> {
        if self.state != SamplerState::Idle {
            anyhow::bail!("Sampler cannot start from the {:?} state", self.state);
        }

        let probe = self.probe.clone();
        let executor = self.executor.clone();
        let log = self.log.clone();
        let interval = self.interval;
        let mut listener = self.stop_handle.new_listener();

        let thread = std::thread::Builder::new()
            .name("sampler".to_string())
            .spawn(move || {
                let started = Instant::now();
                take_sample(&probe, &executor, &log, interval);

                let mut tick: u32 = 1;
                loop {
                    let next = started + interval * tick;
                    if wait_until(next, &mut listener) {
                        // One final sample on the way out, so the post-capture window always
                        // reflects the state after load stopped.
                        take_sample(&probe, &executor, &log, interval);
                        log::debug!("Sampler stopping after {} ticks", tick);
                        break;
                    }
                    take_sample(&probe, &executor, &log, interval);
                    tick += 1;
                }
            })
            .expect("Failed to start sampler thread");

        self.thread = Some(thread);
        self.state = SamplerState::Sampling;
        Ok(())
    }

    /// Sampling → Stopped. Blocks until the final sample has been taken and the thread has
    /// exited.
    pub(crate) fn stop(&mut self) {
        if self.state != SamplerState::Sampling {
            return;
        }

        self.stop_handle.shutdown();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Sampler thread panicked");
            }
        }
        self.state = SamplerState::Stopped;
    }
}

/// Sleep until `deadline`, polling the stop signal. Returns true if stopped first.
fn wait_until(deadline: Instant, listener: &mut ShutdownListener) -> bool {
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

fn take_sample(
    probe: &Arc<dyn ContentionProbe>,
    executor: &Arc<Executor>,
    log: &Arc<SampleLog>,
    deadline: Duration,
) {
    // A failed or overrunning read is a gap, not a retry. Retrying inside the interval would
    // skew the spacing between samples.
    let outcome = executor.block_on(async { tokio::time::timeout(deadline, probe.sample()).await });

    match outcome {
        Ok(Ok(counters)) => {
            log.record(counters);
        }
        Ok(Err(e)) => {
            log::warn!("Metric sample failed, recording a gap: {e}");
            log.record_gap();
        }
        Err(_) => {
            log::warn!("Metric sample timed out, recording a gap");
            log.record_gap();
        }
    }
}
