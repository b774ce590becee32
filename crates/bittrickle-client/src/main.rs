//! BitTrickle client entry point.
//!
//! # Usage
//!
//! ```text
//! bittrickle-client <SERVER_PORT> [OPTIONS]
//!
//! Options:
//!   --server-host <IP>      Rendezvous server address [default: 127.0.0.1]
//!   --share-dir <PATH>      Directory served to other peers [default: .]
//!   --download-dir <PATH>   Directory downloads are saved to [default: .]
//!   --config <PATH>         Optional TOML config file
//! ```
//!
//! # Startup
//!
//! ```text
//! main()
//!  └─ bind transfer listener     (its port goes into AUTH)
//!  └─ login prompt loop          (until AUTH_SUCCESS or end of input)
//!  └─ spawn heartbeat emitter + transfer listener
//!  └─ command prompt loop        (until xit, end of input, or Ctrl-C)
//!  └─ LOGOUT, stop background tasks
//! ```
//!
//! Console output goes to stdout; diagnostics (`RUST_LOG`) go to stderr so
//! they never interleave with prompts.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bittrickle_client::application::active_session::ActiveSession;
use bittrickle_client::application::command::{parse_command, UserCommand, AVAILABLE_COMMANDS};
use bittrickle_client::application::heartbeat::run_heartbeat;
use bittrickle_client::application::ports::RendezvousChannel;
use bittrickle_client::application::session_agent::{AuthOutcome, SessionAgent};
use bittrickle_client::infrastructure::network::rendezvous::UdpRendezvousChannel;
use bittrickle_client::infrastructure::storage::config::{load_config, ClientConfig};
use bittrickle_client::infrastructure::transfer::fetcher::TcpFetcher;
use bittrickle_client::infrastructure::transfer::listener::TransferListener;
use bittrickle_core::Shutdown;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// BitTrickle peer.
///
/// Logs in to a rendezvous server, publishes files from the share directory,
/// and downloads files directly from other peers.
#[derive(Debug, Parser)]
#[command(name = "bittrickle-client", version)]
struct Cli {
    /// UDP port of the rendezvous server.
    server_port: u16,

    /// IP address of the rendezvous server.
    #[arg(long, env = "BITTRICKLE_SERVER_HOST")]
    server_host: Option<IpAddr>,

    /// Directory whose files can be published and served.
    #[arg(long, env = "BITTRICKLE_SHARE_DIR")]
    share_dir: Option<PathBuf>,

    /// Directory downloaded files are written to.
    #[arg(long, env = "BITTRICKLE_DOWNLOAD_DIR")]
    download_dir: Option<PathBuf>,

    /// Optional TOML configuration file.
    #[arg(long, env = "BITTRICKLE_CLIENT_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    fn apply_to(&self, config: &mut ClientConfig) {
        if let Some(host) = self.server_host {
            config.network.server_host = host;
        }
        if let Some(dir) = &self.share_dir {
            config.transfer.share_dir = dir.clone();
        }
        if let Some(dir) = &self.download_dir {
            config.transfer.download_dir = dir.clone();
        }
    }

    fn server_addr(&self, config: &ClientConfig) -> SocketAddr {
        SocketAddr::new(config.network.server_host, self.server_port)
    }
}

/// The transfer listener accepts on every interface of the server's address
/// family; the server advertises whichever address our datagrams came from.
fn listener_addr(server: SocketAddr) -> SocketAddr {
    match server.ip() {
        IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
    }
}

// ── Console helpers ───────────────────────────────────────────────────────────

type InputLines = Lines<BufReader<Stdin>>;

/// Prints `text` without a newline and reads one line.  `None` at end of input.
async fn prompt(lines: &mut InputLines, text: &str) -> anyhow::Result<Option<String>> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await?;
    Ok(lines.next_line().await?)
}

/// Repeats the login prompt until the server accepts.
///
/// Returns `false` if input ended first.
async fn login(agent: &mut SessionAgent, lines: &mut InputLines, transfer_port: u16) -> anyhow::Result<bool> {
    loop {
        let Some(identity) = prompt(lines, "Enter username: ").await? else {
            return Ok(false);
        };
        let Some(secret) = prompt(lines, "Enter password: ").await? else {
            return Ok(false);
        };

        match agent
            .authenticate(identity.trim(), secret.trim(), transfer_port)
            .await
        {
            Ok(AuthOutcome::Accepted) => {
                println!("{}", AuthOutcome::Accepted.message());
                return Ok(true);
            }
            Ok(outcome) => println!("{}", outcome.message()),
            Err(e) => println!("Login failed: {e}"),
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref()).context("failed to load config")?;
    cli.apply_to(&mut config);
    let server = cli.server_addr(&config);

    let listener = TransferListener::bind(
        listener_addr(server),
        config.transfer.share_dir.clone(),
        config.transfer.max_concurrent_uploads,
    )
    .await
    .context("failed to bind transfer listener")?
    .with_idle_timeout(config.upload_idle_timeout());
    let transfer_port = listener.local_addr()?.port();

    let channel: Arc<dyn RendezvousChannel> = Arc::new(
        UdpRendezvousChannel::bind(server, config.request_timeout())
            .await
            .context("failed to open rendezvous socket")?,
    );
    let fetcher = Arc::new(TcpFetcher::new(
        config.transfer.download_dir.clone(),
        config.connect_timeout(),
    ));
    let mut agent = SessionAgent::new(
        Arc::clone(&channel),
        fetcher,
        config.transfer.share_dir.clone(),
    );
    info!(%server, transfer_port, "client started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    if !login(&mut agent, &mut lines, transfer_port).await? {
        return Ok(());
    }
    println!("{AVAILABLE_COMMANDS}");

    // ── Background tasks ──────────────────────────────────────────────────────
    let shutdown = Arc::new(Shutdown::new());
    let heartbeat = tokio::spawn(run_heartbeat(
        Arc::clone(&channel),
        config.heartbeat(),
        Arc::clone(&shutdown),
    ));
    let serving = tokio::spawn(listener.run(Arc::clone(&shutdown)));
    let mut session = ActiveSession::new(shutdown, heartbeat, serving);

    // ── Command loop ──────────────────────────────────────────────────────────
    loop {
        if let Some(warning) = session.take_heartbeat_warning().await {
            println!("{warning}");
        }

        let line = tokio::select! {
            line = prompt(&mut lines, "> ") => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                None
            }
        };
        let Some(line) = line else {
            if let Err(e) = agent.close().await {
                warn!(error = %e, "close failed");
            }
            break;
        };

        match parse_command(&line) {
            Ok(None) => {}
            Ok(Some(command)) => {
                let exiting = command == UserCommand::Exit;
                for output in agent.execute(command).await? {
                    println!("{output}");
                }
                if exiting {
                    break;
                }
            }
            Err(e) => println!("{e}"),
        }
    }

    session.close().await;
    println!("Client has closed the connection.");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
