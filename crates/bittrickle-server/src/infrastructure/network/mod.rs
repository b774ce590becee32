//! Network services for the rendezvous server.

pub mod udp_server;

use std::sync::Arc;
use std::time::Duration;

use tracing::error;

use bittrickle_core::Shutdown;

use crate::application::liveness::run_liveness_monitor;
use udp_server::RendezvousServer;

/// Runs the receive loop and the liveness monitor until `shutdown` fires.
pub async fn run_server(server: RendezvousServer, sweep_interval: Duration, shutdown: Arc<Shutdown>) {
    let monitor = tokio::spawn(run_liveness_monitor(
        server.state(),
        sweep_interval,
        Arc::clone(&shutdown),
    ));

    server.run(Arc::clone(&shutdown)).await;

    // The receive loop only returns on shutdown, so the monitor is stopping too.
    if let Err(e) = monitor.await {
        error!(error = %e, "liveness monitor task failed");
    }
}
