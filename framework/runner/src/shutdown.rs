use grindstone_core::prelude::ShutdownHandle;
use tokio::signal;

/// Install the Ctrl-C handler that funnels a user interrupt into the orchestrator's stop
/// signal. An interrupted run still drains, post-captures and writes whatever report is
/// constructible.
pub(crate) fn start_interrupt_listener(runtime: &tokio::runtime::Runtime) -> ShutdownHandle {
    let handle = ShutdownHandle::default();

    let listener_handle = handle.clone();
    runtime.spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            log::warn!("Failed to listen for Ctrl-C: {e}");
            return;
        }
        listener_handle.shutdown();
        println!("Received interrupt, draining and capturing what we can...");
    });

    handle
}
