//! Traits the application layer drives and the infrastructure layer
//! implements, with their error types.
//!
//! # Why traits here? (for beginners)
//!
//! The session agent needs to send datagrams and download files, but it
//! should not care *how*.  It holds an `Arc<dyn RendezvousChannel>` and an
//! `Arc<dyn PeerFetcher>`.  In production these are the UDP channel and the
//! TCP fetcher from `infrastructure`; in unit tests they are `mockall` mocks,
//! so the state machine can be tested without any sockets.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use bittrickle_core::{ProtocolError, Request, Response};

// ── Rendezvous channel ────────────────────────────────────────────────────────

/// Error type for exchanges with the rendezvous server.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    /// No reply arrived in time.  Datagrams can be lost; the request may or
    /// may not have been applied.
    #[error("no reply from server within {0:?}")]
    Timeout(Duration),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Request/response access to the rendezvous server.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RendezvousChannel: Send + Sync {
    /// Sends `request` and waits for the matching response.
    async fn request(&self, request: &Request) -> Result<Response, ChannelError>;

    /// Sends `request` without waiting for anything back (heartbeat, logout).
    async fn notify(&self, request: &Request) -> Result<(), ChannelError>;
}

// ── Peer fetcher ──────────────────────────────────────────────────────────────

/// Error type for a download from another peer.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The peer could not be reached (it probably went offline after the
    /// server resolved it).
    #[error("peer {peer} is unavailable: {source}")]
    Unavailable {
        peer: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The peer closed the connection without sending the file.
    #[error("peer does not serve the file")]
    NotServed,

    /// The stream ended before the announced length.
    #[error("transfer interrupted after {received} of {expected} bytes")]
    Interrupted { received: u64, expected: u64 },

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Downloads one file from a peer's transfer listener.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PeerFetcher: Send + Sync {
    /// Fetches `filename` from `peer` into the download directory.
    ///
    /// Returns the number of bytes written.
    async fn fetch(&self, peer: SocketAddr, filename: &str) -> Result<u64, TransferError>;
}
