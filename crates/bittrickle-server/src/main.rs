//! BitTrickle rendezvous server entry point.
//!
//! # Usage
//!
//! ```text
//! bittrickle-server <PORT> [OPTIONS]
//!
//! Options:
//!   --bind <IP>           Address to bind [default: 127.0.0.1, or config file]
//!   --credentials <PATH>  Credential file [default: credentials.txt, or config file]
//!   --config <PATH>       Optional TOML config file
//! ```
//!
//! Flags (and their `BITTRICKLE_*` environment variables) take precedence over
//! the config file, which takes precedence over built-in defaults.
//!
//! # Startup
//!
//! ```text
//! main()
//!  └─ load config, apply CLI overrides
//!  └─ load credential file            (fatal on error)
//!  └─ bind UDP socket                 (fatal on error)
//!  └─ run_server()
//!       ├─ receive loop               (this task)
//!       └─ liveness monitor           (spawned task)
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use bittrickle_core::Shutdown;
use bittrickle_server::application::dispatch::{Dispatcher, RendezvousState};
use bittrickle_server::infrastructure::network::run_server;
use bittrickle_server::infrastructure::network::udp_server::RendezvousServer;
use bittrickle_server::infrastructure::storage::config::{load_config, ServerConfig};
use bittrickle_server::infrastructure::storage::credentials::CredentialFile;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// BitTrickle rendezvous server.
///
/// Authenticates peers, tracks who is online, and answers file searches.
/// File contents never pass through this process.
#[derive(Debug, Parser)]
#[command(name = "bittrickle-server", version)]
struct Cli {
    /// UDP port to listen on.
    port: u16,

    /// IP address to bind the socket to.
    #[arg(long, env = "BITTRICKLE_BIND")]
    bind: Option<IpAddr>,

    /// Path of the `identity secret` credential file.
    #[arg(long, env = "BITTRICKLE_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// Optional TOML configuration file.
    #[arg(long, env = "BITTRICKLE_SERVER_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    /// Overlays the flags that were given onto `config`.
    fn apply_to(&self, config: &mut ServerConfig) {
        if let Some(bind) = self.bind {
            config.network.bind_address = bind;
        }
        if let Some(path) = &self.credentials {
            config.credentials.path = path.clone();
        }
    }

    fn bind_addr(&self, config: &ServerConfig) -> SocketAddr {
        SocketAddr::new(config.network.bind_address, self.port)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).context("failed to load config")?;
    cli.apply_to(&mut config);

    let credentials = CredentialFile::load(&config.credentials.path).with_context(|| {
        format!(
            "failed to load credentials from {}",
            config.credentials.path.display()
        )
    })?;
    info!(
        users = credentials.len(),
        path = %config.credentials.path.display(),
        "credentials loaded"
    );

    let state = Arc::new(Mutex::new(RendezvousState::new(config.liveness_timeout())));
    let dispatcher = Dispatcher::new(state, Arc::new(credentials));
    let server = RendezvousServer::bind(cli.bind_addr(&config), dispatcher)
        .await
        .context("failed to start rendezvous server")?;

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let shutdown = Arc::new(Shutdown::new());
    let shutdown_clone = Arc::clone(&shutdown);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                shutdown_clone.trigger();
            }
            Err(e) => error!("failed to listen for Ctrl-C: {e}"),
        }
    });

    run_server(server, config.sweep_interval(), shutdown).await;

    info!("BitTrickle server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
