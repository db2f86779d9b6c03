//! Two-phase server shutdown.
//!
//! A kill request does not end the process. The router that served it
//! raises the [`ShutdownSignal`] after the reply is written; the server
//! loop then drains its connections and returns
//! [`ServerExit::KillRequested`]. Exiting is up to the host.

use std::sync::Arc;

use amman_relay_protocol::KILL_AMMAN_EXIT_CODE;
use tokio::sync::watch;

/// Why the server loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerExit {
    /// A client asked amman to shut down.
    KillRequested,
    /// The host stopped the server.
    Stopped,
}

impl ServerExit {
    /// The process exit code the host should use.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::KillRequested => KILL_AMMAN_EXIT_CODE,
            Self::Stopped => 0,
        }
    }
}

/// A cloneable, one-shot shutdown trigger. The first reason wins.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<Option<ServerExit>>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Raises the signal. Ignored if it was already raised.
    pub fn trigger(&self, exit: ServerExit) {
        let raised = self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(exit);
            true
        });
        if raised {
            tracing::info!(?exit, "relay shutdown requested");
        }
    }

    /// Stops the server without a kill request.
    pub fn stop(&self) {
        self.trigger(ServerExit::Stopped);
    }

    /// The reason the signal was raised with, if it was.
    pub fn reason(&self) -> Option<ServerExit> {
        *self.tx.borrow()
    }

    /// Resolves once the signal is raised.
    pub async fn triggered(&self) -> ServerExit {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(exit) = *rx.borrow_and_update() {
                return exit;
            }
            // The sender lives in `self`; closed means never.
            if rx.changed().await.is_err() {
                return ServerExit::Stopped;
            }
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_reason_wins() {
        let signal = ShutdownSignal::new();
        signal.trigger(ServerExit::KillRequested);
        signal.stop();
        assert_eq!(signal.reason(), Some(ServerExit::KillRequested));
        assert_eq!(signal.triggered().await, ServerExit::KillRequested);
    }

    #[tokio::test]
    async fn test_waiters_wake_on_trigger() {
        let signal = ShutdownSignal::new();
        let waiter = tokio::spawn({
            let signal = signal.clone();
            async move { signal.triggered().await }
        });
        tokio::task::yield_now().await;
        signal.stop();
        assert_eq!(waiter.await.unwrap(), ServerExit::Stopped);
    }

    #[test]
    fn test_kill_exit_code() {
        assert_eq!(ServerExit::KillRequested.exit_code(), 111);
        assert_eq!(ServerExit::Stopped.exit_code(), 0);
    }
}
