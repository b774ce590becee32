//! TCP implementation of [`PeerFetcher`].
//!
//! A download is written to a hidden temporary file next to its final name
//! and renamed only after the announced number of bytes has arrived.  An
//! interrupted transfer therefore never leaves a truncated file under the
//! real name.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

use bittrickle_core::protocol::transfer::{
    decode_length_header, encode_transfer_request, TRANSFER_HEADER_LEN,
};

use crate::application::ports::{PeerFetcher, TransferError};

/// Default limit for connecting to a peer and for receiving its length header.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

const RECEIVE_BUFFER_LEN: usize = 64 * 1024;

pub struct TcpFetcher {
    download_dir: PathBuf,
    connect_timeout: Duration,
}

impl TcpFetcher {
    pub fn new(download_dir: impl Into<PathBuf>, connect_timeout: Duration) -> Self {
        Self {
            download_dir: download_dir.into(),
            connect_timeout,
        }
    }

    async fn connect(&self, peer: SocketAddr) -> Result<TcpStream, TransferError> {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(peer)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => Err(TransferError::Unavailable { peer, source }),
            Err(_) => Err(TransferError::Unavailable {
                peer,
                source: std::io::ErrorKind::TimedOut.into(),
            }),
        }
    }

    /// Reads the length header.  A clean close before any byte means the
    /// peer does not serve the file.
    async fn read_header(&self, stream: &mut TcpStream) -> Result<u64, TransferError> {
        let mut header = [0u8; TRANSFER_HEADER_LEN];
        let read = tokio::time::timeout(self.connect_timeout, stream.read_exact(&mut header))
            .await
            .map_err(|_| TransferError::Io(std::io::ErrorKind::TimedOut.into()))?;
        match read {
            Ok(_) => Ok(decode_length_header(header)),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(TransferError::NotServed),
            Err(e) => Err(TransferError::Io(e)),
        }
    }
}

#[async_trait]
impl PeerFetcher for TcpFetcher {
    async fn fetch(&self, peer: SocketAddr, filename: &str) -> Result<u64, TransferError> {
        let request = encode_transfer_request(filename)?;

        let mut stream = self.connect(peer).await?;
        stream.write_all(&request).await?;
        let expected = self.read_header(&mut stream).await?;
        debug!(%peer, filename, expected, "receiving file");

        tokio::fs::create_dir_all(&self.download_dir).await?;
        let final_path = self.download_dir.join(filename);
        let temp_path = temp_path_in(&self.download_dir);

        let received = match receive_body(&mut stream, &temp_path, expected).await {
            Ok(received) => received,
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(e);
            }
        };

        tokio::fs::rename(&temp_path, &final_path).await?;
        info!(%peer, filename, bytes = received, "download complete");
        Ok(received)
    }
}

/// A hidden temporary name of fixed length, so any filename the protocol
/// accepts still has room on the file system.
fn temp_path_in(dir: &Path) -> PathBuf {
    dir.join(format!(".{}.part", uuid::Uuid::new_v4()))
}

/// Copies the body into a new file at `path`, counting bytes as they land.
///
/// Once the header has arrived, a stream that ends or fails before
/// `expected` bytes is reported as [`TransferError::Interrupted`]; only
/// local file errors surface as [`TransferError::Io`].
async fn receive_body(
    stream: &mut TcpStream,
    path: &Path,
    expected: u64,
) -> Result<u64, TransferError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut buf = vec![0u8; RECEIVE_BUFFER_LEN];
    let mut received = 0u64;

    while received < expected {
        let want = usize::try_from(expected - received).map_or(buf.len(), |left| left.min(buf.len()));
        let n = match stream.read(&mut buf[..want]).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!(error = %e, received, expected, "transfer stream failed");
                break;
            }
        };
        file.write_all(&buf[..n]).await?;
        received += n as u64;
    }
    file.flush().await?;

    if received < expected {
        return Err(TransferError::Interrupted { received, expected });
    }
    Ok(received)
}
