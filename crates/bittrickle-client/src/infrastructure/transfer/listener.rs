//! TCP transfer listener: serves files from the share directory to peers.
//!
//! Each accepted connection is handled on its own task, so one slow peer
//! never blocks another.  A semaphore caps how many uploads run at once.
//! The accept loop takes a permit *before* accepting, so once the cap is
//! reached further peers wait in the kernel's listen backlog rather than
//! piling up as tasks.
//!
//! # Serving rules
//!
//! - The request is a single filename line read within `request_timeout`.
//! - Only regular files directly inside the share directory are served.
//!   Names are validated before they are joined onto the directory, so a
//!   request can never escape it.
//! - A request that cannot be served is answered by closing the connection
//!   without sending any bytes.
//! - A peer that stops reading for `idle_timeout` loses its upload and its
//!   permit.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use bittrickle_core::protocol::transfer::{
    encode_length_header, parse_transfer_request, MAX_TRANSFER_REQUEST_LEN, REQUEST_TERMINATOR,
};
use bittrickle_core::{ProtocolError, Shutdown};

/// Default cap on simultaneous uploads.
pub const DEFAULT_MAX_CONCURRENT_UPLOADS: usize = 16;

/// How long a connected peer has to send its filename request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a single write to the peer may block before the upload is dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

const UPLOAD_CHUNK_LEN: usize = 64 * 1024;

/// Error type for the transfer listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind transfer listener to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad transfer request: {0}")]
    BadRequest(#[from] ProtocolError),

    #[error("peer sent no request in time")]
    RequestTimeout,

    #[error("not a shared file: {0}")]
    NotFound(String),

    #[error("peer stopped reading after {sent} bytes")]
    UploadStalled { sent: u64 },
}

pub struct TransferListener {
    listener: TcpListener,
    share_dir: PathBuf,
    permits: Arc<Semaphore>,
    request_timeout: Duration,
    idle_timeout: Duration,
}

impl TransferListener {
    /// Binds the listener.  Bind before authenticating: the bound port is
    /// part of the `AUTH` request.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::Bind`] if the address is unavailable.
    pub async fn bind(
        addr: SocketAddr,
        share_dir: impl Into<PathBuf>,
        max_concurrent: usize,
    ) -> Result<Self, ListenerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind { addr, source })?;
        Ok(Self {
            listener,
            share_dir: share_dir.into(),
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        })
    }

    /// Overrides [`DEFAULT_REQUEST_TIMEOUT`].
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Overrides [`DEFAULT_IDLE_TIMEOUT`].
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ListenerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until `shutdown` fires.
    ///
    /// Uploads already in progress are left to finish on their own tasks.
    pub async fn run(self, shutdown: Arc<Shutdown>) {
        let share_dir = Arc::new(self.share_dir);
        info!(dir = %share_dir.display(), "transfer listener running");

        loop {
            let permit = tokio::select! {
                _ = shutdown.cancelled() => break,
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "transfer accept failed");
                    continue;
                }
            };

            let share_dir = Arc::clone(&share_dir);
            let request_timeout = self.request_timeout;
            let idle_timeout = self.idle_timeout;
            tokio::spawn(async move {
                let _permit = permit;
                match serve_connection(stream, &share_dir, request_timeout, idle_timeout).await {
                    Ok(bytes) => info!(%peer, bytes, "served file"),
                    Err(e @ ListenerError::UploadStalled { .. }) => {
                        warn!(%peer, error = %e, "upload dropped")
                    }
                    Err(e) => debug!(%peer, error = %e, "transfer request not served"),
                }
            });
        }

        info!("transfer listener stopped");
    }
}

/// Handles one connection: read the request, stream the file, close.
///
/// Returns the number of content bytes sent.
async fn serve_connection(
    stream: TcpStream,
    share_dir: &Path,
    request_timeout: Duration,
    idle_timeout: Duration,
) -> Result<u64, ListenerError> {
    let mut reader = BufReader::new(stream);

    let mut request = Vec::with_capacity(64);
    tokio::time::timeout(
        request_timeout,
        (&mut reader)
            .take(MAX_TRANSFER_REQUEST_LEN as u64)
            .read_until(REQUEST_TERMINATOR, &mut request),
    )
    .await
    .map_err(|_| ListenerError::RequestTimeout)??;

    let filename = parse_transfer_request(&request)?;
    let (file, len) = open_shared(share_dir, filename).await?;

    let mut stream = reader.into_inner();
    write_idle_bounded(&mut stream, &encode_length_header(len), idle_timeout, 0).await?;
    let sent = send_body(&mut stream, file, len, idle_timeout).await?;
    stream.shutdown().await?;
    Ok(sent)
}

/// Streams `len` bytes of `file`, giving up if any one write stalls.
async fn send_body(
    stream: &mut TcpStream,
    file: tokio::fs::File,
    len: u64,
    idle_timeout: Duration,
) -> Result<u64, ListenerError> {
    let mut body = file.take(len);
    let mut buf = vec![0u8; UPLOAD_CHUNK_LEN];
    let mut sent = 0u64;
    loop {
        let n = body.read(&mut buf).await?;
        if n == 0 {
            return Ok(sent);
        }
        write_idle_bounded(stream, &buf[..n], idle_timeout, sent).await?;
        sent += n as u64;
    }
}

async fn write_idle_bounded(
    stream: &mut TcpStream,
    bytes: &[u8],
    idle_timeout: Duration,
    sent: u64,
) -> Result<(), ListenerError> {
    tokio::time::timeout(idle_timeout, stream.write_all(bytes))
        .await
        .map_err(|_| ListenerError::UploadStalled { sent })??;
    Ok(())
}

/// Opens `filename` inside `share_dir` if it is a regular file.
///
/// `filename` must already be validated.
async fn open_shared(share_dir: &Path, filename: &str) -> Result<(tokio::fs::File, u64), ListenerError> {
    let path = share_dir.join(filename);
    let not_found = || ListenerError::NotFound(filename.to_string());

    let file = tokio::fs::File::open(&path).await.map_err(|_| not_found())?;
    let metadata = file.metadata().await?;
    if !metadata.is_file() {
        return Err(not_found());
    }
    Ok((file, metadata.len()))
}
