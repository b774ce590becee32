//! Liveness monitor: evicts sessions that have gone quiet.
//!
//! Runs as its own tokio task beside the receive loop.  On every tick it
//! locks the shared state and calls [`SessionRegistry::sweep`], so with the
//! defaults (3 s timeout, 1 s sweep) a vanished client is dropped at most
//! about 4 s after its last datagram.
//!
//! [`SessionRegistry::sweep`]: bittrickle_core::SessionRegistry::sweep

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use bittrickle_core::{Session, Shutdown};

use crate::application::dispatch::SharedState;

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Sweeps once at `now` and logs every eviction.
pub async fn sweep_once(state: &SharedState, now: Instant) -> Vec<Session> {
    let evicted = state.lock().await.registry.sweep(now);
    for session in &evicted {
        info!(
            identity = %session.identity,
            origin = %session.origin,
            "session expired"
        );
    }
    evicted
}

/// Sweeps every `sweep_interval` until `shutdown` fires.
pub async fn run_liveness_monitor(
    state: SharedState,
    sweep_interval: Duration,
    shutdown: Arc<Shutdown>,
) {
    let mut ticker = tokio::time::interval(sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(?sweep_interval, "liveness monitor started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                sweep_once(&state, Instant::now()).await;
            }
        }
    }

    debug!("liveness monitor stopped");
}
