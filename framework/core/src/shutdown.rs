use std::{borrow::BorrowMut, sync::Arc};

use tokio::sync::broadcast::{Receiver, Sender};
use tokio::sync::Mutex;

/// The sending half of a stop signal.
///
/// The orchestrator holds one of these per group of actors it needs to stop
/// independently. Cloning the handle does not create a new signal, it shares
/// the same one.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Sender<()>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            sender: tokio::sync::broadcast::channel(1).0,
        }
    }

    pub fn shutdown(&self) {
        if let Err(e) = self.sender.send(()) {
            // Will fail if nobody is listening for the signal, in which case the log message
            // can be ignored.
            log::warn!("Failed to send stop signal: {e:?}");
        }
    }

    pub fn new_listener(&self) -> ShutdownListener {
        ShutdownListener::new(self.sender.subscribe())
    }
}

#[derive(Clone, Debug)]
pub struct ShutdownListener {
    receiver: Arc<Mutex<Receiver<()>>>,
}

impl ShutdownListener {
    pub(crate) fn new(receiver: Receiver<()>) -> Self {
        Self {
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    /// Point in time check whether the stop signal has been received.
    ///
    /// Worker loops call this once per iteration and exit cleanly when it returns true. In-flight
    /// work is allowed to finish; nothing is torn down mid-call.
    pub fn should_shutdown(&mut self) -> bool {
        match self.receiver.try_lock() {
            Ok(mut guard) => {
                match guard.try_recv() {
                    Ok(_) => true,
                    Err(tokio::sync::broadcast::error::TryRecvError::Closed) => true,
                    // If the receiver is empty or lagged then we should not shutdown.
                    Err(_) => false,
                }
            }
            Err(_) => false,
        }
    }

    /// Wait for the stop signal to be received. It is safe to race this with another future so
    /// that the signal can be used to cancel work in progress.
    pub async fn wait_for_shutdown(&mut self) {
        self.receiver
            .borrow_mut()
            .lock()
            .await
            .recv()
            .await
            .expect("Failed to receive stop signal");
    }
}

#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct ShutdownSignalError {
    msg: String,
}

impl Default for ShutdownSignalError {
    fn default() -> Self {
        Self {
            msg: "Execution cancelled by stop signal".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_sees_signal_sent_before_subscribing_poll() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.new_listener();

        assert!(!listener.should_shutdown());

        handle.shutdown();
        assert!(listener.should_shutdown());
    }

    #[test]
    fn every_listener_observes_the_same_signal() {
        let handle = ShutdownHandle::new();
        let mut first = handle.new_listener();
        let mut second = handle.new_listener();

        handle.shutdown();

        assert!(first.should_shutdown());
        assert!(second.should_shutdown());
    }

    #[tokio::test]
    async fn wait_for_shutdown_completes_when_signalled() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.new_listener();

        let waiter = tokio::spawn(async move { listener.wait_for_shutdown().await });

        handle.shutdown();
        waiter.await.expect("Listener task failed");
    }
}
