//! Background tasks owned by a logged-in session.
//!
//! After login two tasks run beside the command loop: the heartbeat emitter
//! and the transfer listener.  [`ActiveSession`] holds their join handles and
//! the shared [`Shutdown`] signal, so closing the session is one call that
//! signals both and waits for them to finish.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use bittrickle_core::Shutdown;

use crate::application::heartbeat::HeartbeatExit;

/// How long [`ActiveSession::close`] waits for each task before giving up on it.
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

pub struct ActiveSession {
    shutdown: Arc<Shutdown>,
    heartbeat: Option<JoinHandle<HeartbeatExit>>,
    listener: Option<JoinHandle<()>>,
}

impl ActiveSession {
    /// Takes ownership of already-spawned tasks that watch `shutdown`.
    pub fn new(
        shutdown: Arc<Shutdown>,
        heartbeat: JoinHandle<HeartbeatExit>,
        listener: JoinHandle<()>,
    ) -> Self {
        Self {
            shutdown,
            heartbeat: Some(heartbeat),
            listener: Some(listener),
        }
    }

    /// Returns a warning line the first time the heartbeat emitter is seen to
    /// have stopped on its own.
    pub async fn take_heartbeat_warning(&mut self) -> Option<String> {
        if !self.heartbeat.as_ref()?.is_finished() {
            return None;
        }
        let handle = self.heartbeat.take()?;
        match handle.await {
            Ok(HeartbeatExit::Degraded { failures }) => Some(format!(
                "Warning: heartbeats stopped after {failures} failed sends; \
                 the server may end this session."
            )),
            Ok(HeartbeatExit::Shutdown) => None,
            Err(e) => Some(format!("Warning: heartbeat task failed: {e}")),
        }
    }

    /// Signals shutdown and waits for both tasks.
    pub async fn close(mut self) {
        self.shutdown.trigger();

        if let Some(handle) = self.heartbeat.take() {
            match tokio::time::timeout(JOIN_TIMEOUT, handle).await {
                Ok(Ok(exit)) => debug!(?exit, "heartbeat task joined"),
                Ok(Err(e)) => warn!(error = %e, "heartbeat task failed"),
                Err(_) => warn!("heartbeat task did not stop in time"),
            }
        }
        if let Some(handle) = self.listener.take() {
            match tokio::time::timeout(JOIN_TIMEOUT, handle).await {
                Ok(Ok(())) => debug!("listener task joined"),
                Ok(Err(e)) => warn!(error = %e, "listener task failed"),
                Err(_) => warn!("listener task did not stop in time"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_close_triggers_shutdown_and_joins_tasks() {
        // Arrange: two tasks that only end on shutdown
        let shutdown = Arc::new(Shutdown::new());
        let hb_signal = Arc::clone(&shutdown);
        let heartbeat = tokio::spawn(async move {
            hb_signal.cancelled().await;
            HeartbeatExit::Shutdown
        });
        let ls_signal = Arc::clone(&shutdown);
        let listener = tokio::spawn(async move { ls_signal.cancelled().await });
        let session = ActiveSession::new(Arc::clone(&shutdown), heartbeat, listener);

        // Act
        tokio::time::timeout(Duration::from_secs(1), session.close())
            .await
            .expect("close must not hang");

        // Assert
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_degraded_heartbeat_is_reported_once() {
        let shutdown = Arc::new(Shutdown::new());
        let heartbeat = tokio::spawn(async { HeartbeatExit::Degraded { failures: 3 } });
        let listener = tokio::spawn(async {});
        let mut session = ActiveSession::new(shutdown, heartbeat, listener);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let first = session.take_heartbeat_warning().await;
        let second = session.take_heartbeat_warning().await;

        assert!(first.unwrap().contains("3 failed sends"));
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_running_heartbeat_gives_no_warning() {
        let shutdown = Arc::new(Shutdown::new());
        let signal = Arc::clone(&shutdown);
        let heartbeat = tokio::spawn(async move {
            signal.cancelled().await;
            HeartbeatExit::Shutdown
        });
        let mut session = ActiveSession::new(shutdown, heartbeat, tokio::spawn(async {}));

        assert!(session.take_heartbeat_warning().await.is_none());
        session.close().await;
    }
}
