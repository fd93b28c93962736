//! Reconnect loop around [`ConnectionSession`].
//!
//! ```text
//! loop while running:
//!     fresh session (child token) ─► callbacks ─► run ─► attempt ended
//!     drop the bridge's link
//!     sleep(retry_delay)  ── or ──  shutdown ─► exit
//! ```
//!
//! Nothing carries over from one attempt to the next except the bridge's
//! own state (telemetry cache, simulation status).  Shutdown cancels the
//! current attempt through its child token and skips the delay.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::application::EventBridge;
use crate::domain::config::LinkConfig;
use crate::infrastructure::session::{ConnectionSession, EndReason, SessionHandle};
use crate::infrastructure::shutdown::ShutdownHandle;

/// Runs connection attempts back to back until shutdown.
pub struct ReconnectSupervisor {
    link: LinkConfig,
    bridge: Arc<EventBridge>,
    shutdown: ShutdownHandle,
    attempts: AtomicU64,
    current: Mutex<Option<SessionHandle>>,
}

impl ReconnectSupervisor {
    /// Creates a supervisor that feeds every attempt into `bridge`.
    pub fn new(link: LinkConfig, bridge: Arc<EventBridge>, shutdown: ShutdownHandle) -> Self {
        Self {
            link,
            bridge,
            shutdown,
            attempts: AtomicU64::new(0),
            current: Mutex::new(None),
        }
    }

    /// Number of attempts started so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Handle to the attempt in progress, if any.
    pub fn current_session(&self) -> Option<SessionHandle> {
        lock(&self.current).clone()
    }

    /// Runs attempts until the shutdown handle is triggered.
    pub async fn run(&self) {
        while self.shutdown.is_running() {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            info!(
                "Connecting to ws://{}:{}{} (attempt {attempt})",
                self.link.host, self.link.port, self.link.target
            );

            let reason = self.run_attempt().await;
            debug!("attempt {attempt} ended: {:?}", reason.kind());
            self.bridge.on_link_lost();
            *lock(&self.current) = None;

            if !self.shutdown.is_running() {
                break;
            }
            info!("Reconnecting in {:?}", self.link.retry_delay);
            tokio::select! {
                _ = tokio::time::sleep(self.link.retry_delay) => {}
                _ = self.shutdown.cancelled() => break,
            }
        }
        info!("Reconnect loop stopped after {} attempt(s)", self.attempts());
    }

    async fn run_attempt(&self) -> EndReason {
        let mut session = ConnectionSession::new(
            self.link.session.clone(),
            self.shutdown.token().child_token(),
        );

        let bridge = Arc::clone(&self.bridge);
        session.register_handshake_callback(move |queue| bridge.on_link_established(queue));
        let bridge = Arc::clone(&self.bridge);
        session.register_read_callback(move |body| {
            bridge.on_wire_message(&body);
        });

        *lock(&self.current) = Some(session.handle());
        session
            .run(&self.link.host, self.link.port, &self.link.target)
            .await
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn unreachable_link(retry_delay: Duration) -> LinkConfig {
        LinkConfig {
            host: "127.0.0.1".to_string(),
            // Port 1 on loopback refuses immediately
            port: 1,
            retry_delay,
            ..LinkConfig::default()
        }
    }

    #[tokio::test]
    async fn test_no_attempt_after_prior_shutdown() {
        // Arrange
        let shutdown = ShutdownHandle::new();
        shutdown.trigger();
        let supervisor = ReconnectSupervisor::new(
            unreachable_link(Duration::from_millis(10)),
            Arc::new(EventBridge::new(false)),
            shutdown,
        );

        // Act
        supervisor.run().await;

        // Assert
        assert_eq!(supervisor.attempts(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_during_delay_exits_without_waiting() {
        // Arrange: a delay far longer than the test timeout
        let shutdown = ShutdownHandle::new();
        let supervisor = Arc::new(ReconnectSupervisor::new(
            unreachable_link(Duration::from_secs(3600)),
            Arc::new(EventBridge::new(false)),
            shutdown.clone(),
        ));
        let runner = tokio::spawn({
            let supervisor = Arc::clone(&supervisor);
            async move { supervisor.run().await }
        });

        // Act: wait for the first attempt to fail, then shut down
        while supervisor.attempts() == 0 || supervisor.current_session().is_some() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        shutdown.trigger();

        // Assert
        tokio::time::timeout(Duration::from_secs(2), runner)
            .await
            .expect("supervisor should stop promptly")
            .unwrap();
        assert_eq!(supervisor.attempts(), 1);
    }
}
