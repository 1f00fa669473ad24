//! Cooperative shutdown.
//!
//! One [`ShutdownToken`] is cloned into every long-lived task; the
//! orchestrator trips it exactly once, on a signal in production or
//! directly from a test.

use tokio_util::sync::CancellationToken;

/// Handle used both to trigger and to observe shutdown.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    token: CancellationToken,
}

impl ShutdownToken {
    /// Create an untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the token, waking every task parked in [`ShutdownToken::wait`].
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Resolve once shutdown has been triggered. Safe to call from any
    /// number of clones, any number of times.
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }

    /// Whether shutdown has already been triggered.
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Block until the process receives a termination signal.
#[cfg(unix)]
pub async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate()).expect("SIGTERM handler");
    let sig = tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = term.recv() => "SIGTERM",
    };
    tracing::info!("{sig} received, shutting down");
}

/// Block until the process receives a termination signal.
#[cfg(not(unix))]
pub async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Ctrl-C received, shutting down");
}
