//! Cooperative shutdown for the relay.
//!
//! A [`ShutdownSignal`] is a cloneable cancellation token. Once triggered it
//! stays triggered, so tasks that start waiting after the fact still observe
//! it. The stream consumer and the heartbeat task each stop on their own
//! token; the session controller trips both as soon as its run token fires,
//! before waiting on any in-flight delivery.

use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;

/// Cloneable, sticky cancellation token
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once [`trigger`](Self::trigger) has been called on any clone
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as any clone of the token, so this cannot
        // observe a closed channel while `self` is alive.
        let _ = rx.wait_for(|triggered| *triggered).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for Ctrl+C or SIGTERM, then trigger `shutdown`
pub async fn listen_for_signals(shutdown: ShutdownSignal) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, stopping relay");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, stopping relay");
        }
        _ = shutdown.cancelled() => {
            return;
        }
    }

    shutdown.trigger();
}
