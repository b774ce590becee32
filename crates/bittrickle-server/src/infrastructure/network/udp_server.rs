//! Datagram receive loop for the rendezvous server.
//!
//! One socket, one loop: each datagram is decoded, dispatched, and answered
//! before the next is read.  A failed receive or send is logged and the loop
//! carries on; only the shutdown signal ends it.
//!
//! # How the server learns who is talking (for beginners)
//!
//! UDP has no connections.  Every `recv_from` yields the bytes and the
//! sender's address, and every reply is a `send_to` aimed back at that
//! address.  After a successful `AUTH`, the server remembers which identity
//! lives at that address, so a bare `lap` from the same socket is enough to
//! know who asked.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use bittrickle_core::protocol::messages::MAX_DATAGRAM_SIZE;
use bittrickle_core::{encode_response, Shutdown};

use crate::application::dispatch::{Dispatcher, SharedState};

/// One byte more than the largest legal datagram, so oversized requests are
/// seen as oversized instead of silently truncated.
const RECV_BUFFER_LEN: usize = MAX_DATAGRAM_SIZE + 1;

/// Error type for the datagram server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind rendezvous socket on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// The bound rendezvous socket plus its dispatcher.
pub struct RendezvousServer {
    socket: UdpSocket,
    dispatcher: Dispatcher,
}

impl RendezvousServer {
    /// Binds the datagram socket.  Port `0` picks a free port.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::BindFailed`] if the address is unavailable.
    pub async fn bind(addr: SocketAddr, dispatcher: Dispatcher) -> Result<Self, ServerError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| ServerError::BindFailed { addr, source })?;
        Ok(Self { socket, dispatcher })
    }

    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the OS cannot report the address.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.socket.local_addr()?)
    }

    /// Shared registry and catalog behind this server's dispatcher.
    pub fn state(&self) -> SharedState {
        self.dispatcher.state()
    }

    /// Serves datagrams until `shutdown` fires.
    pub async fn run(&self, shutdown: Arc<Shutdown>) {
        let mut buf = vec![0u8; RECV_BUFFER_LEN];
        if let Ok(addr) = self.socket.local_addr() {
            info!(%addr, "rendezvous server listening");
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((len, origin)) => self.handle_datagram(origin, &buf[..len]).await,
                    // e.g. ICMP port-unreachable surfaced on the next receive (Windows)
                    Err(e) => warn!(error = %e, "recv_from failed"),
                },
            }
        }

        info!("rendezvous server stopped");
    }

    async fn handle_datagram(&self, origin: SocketAddr, datagram: &[u8]) {
        let Some(response) = self.dispatcher.dispatch(origin, datagram).await else {
            return;
        };
        let bytes = encode_response(&response);
        debug!(%origin, len = bytes.len(), "reply");
        if let Err(e) = self.socket.send_to(&bytes, origin).await {
            warn!(%origin, error = %e, "send_to failed");
        }
    }
}
