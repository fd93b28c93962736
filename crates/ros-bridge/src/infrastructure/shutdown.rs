//! Process-wide shutdown signal.
//!
//! A [`ShutdownHandle`] pairs the "keep running" flag with a cancellation
//! token.  Triggering it clears the flag and cancels the token, which aborts
//! any in-flight connection attempt (every attempt runs on a child token)
//! and wakes the supervisor out of its retry delay.
//!
//! [`watch_operator`] wires the handle to the two operator inputs: a line
//! on stdin and Ctrl+C.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Cloneable shutdown trigger.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    running: Arc<AtomicBool>,
    token: CancellationToken,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    /// Creates a handle in the running state.
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            token: CancellationToken::new(),
        }
    }

    /// Returns `false` once shutdown has been triggered.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Clears the running flag and cancels the token.  Idempotent.
    pub fn trigger(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("shutdown requested");
        }
        self.token.cancel();
    }

    /// The token cancelled by [`ShutdownHandle::trigger`].
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Completes once shutdown has been triggered.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

/// Triggers `shutdown` on the first stdin line or on Ctrl+C.
///
/// Stdin is read on a detached OS thread since blocking reads cannot be
/// cancelled.  End of input (stdin closed or redirected from `/dev/null`)
/// does not trigger shutdown.
pub fn watch_operator(shutdown: &ShutdownHandle) {
    let stdin_shutdown = shutdown.clone();
    let spawned = thread::Builder::new()
        .name("operator-input".to_string())
        .spawn(move || {
            let mut line = String::new();
            match std::io::stdin().lock().read_line(&mut line) {
                Ok(0) => debug!("stdin closed; operator shutdown via stdin disabled"),
                Ok(_) => stdin_shutdown.trigger(),
                Err(e) => debug!("stdin unreadable ({e}); operator shutdown via stdin disabled"),
            }
        });
    if let Err(e) = spawned {
        error!("failed to start operator input thread: {e}");
    }

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C");
                signal_shutdown.trigger();
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });
}

// ── Tests ─────────────────────────────────────────────────────────────────────
