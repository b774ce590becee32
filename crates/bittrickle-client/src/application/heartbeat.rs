//! Heartbeat emitter: keeps the server-side session alive.
//!
//! Sends `HEARTBEAT` every `interval` until shutdown.  Heartbeats are never
//! answered, so only local send failures are visible here.  After
//! `max_failures` consecutive failures the emitter gives up and reports
//! [`HeartbeatExit::Degraded`]; the server will evict the session shortly
//! after.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, warn};

use bittrickle_core::{Request, Shutdown};

use crate::application::ports::RendezvousChannel;

/// Why the emitter stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatExit {
    /// The shutdown signal fired.
    Shutdown,
    /// Too many consecutive send failures.
    Degraded { failures: u32 },
}

/// Emitter settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    pub interval: Duration,
    pub max_failures: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_failures: 3,
        }
    }
}

/// Runs the emitter until shutdown or degradation.
///
/// The first heartbeat goes out one `interval` after the call; login itself
/// counts as the first sign of life.
pub async fn run_heartbeat(
    channel: Arc<dyn RendezvousChannel>,
    config: HeartbeatConfig,
    shutdown: Arc<Shutdown>,
) -> HeartbeatExit {
    let mut ticker = interval_at(Instant::now() + config.interval, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failures = 0u32;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return HeartbeatExit::Shutdown,
            _ = ticker.tick() => {}
        }

        match channel.notify(&Request::Heartbeat).await {
            Ok(()) => {
                failures = 0;
                debug!("heartbeat sent");
            }
            Err(e) => {
                failures += 1;
                warn!(error = %e, failures, "heartbeat send failed");
                if failures >= config.max_failures {
                    error!(failures, "heartbeat emitter giving up");
                    return HeartbeatExit::Degraded { failures };
                }
            }
        }
    }
}
