//! UDP implementation of [`RendezvousChannel`].
//!
//! One socket carries both request/response exchanges and fire-and-forget
//! heartbeats, so the server sees every datagram from the same origin.
//!
//! # Best-effort delivery (for beginners)
//!
//! UDP may drop, duplicate, or delay datagrams.  There are no sequence
//! numbers in this protocol, so the channel protects itself two ways:
//!
//! 1. Before each request it drains any datagram already waiting on the
//!    socket; a late reply to an earlier, timed-out request must not be
//!    mistaken for the answer to this one.
//! 2. Each request waits at most `request_timeout` for a reply and then
//!    reports [`ChannelError::Timeout`].  It is not retried.
//!
//! Exchanges are serialised by a mutex so two concurrent requests cannot
//! steal each other's replies.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use bittrickle_core::protocol::messages::MAX_DATAGRAM_SIZE;
use bittrickle_core::{decode_response, encode_request, Request, Response};

use crate::application::ports::{ChannelError, RendezvousChannel};

/// Default wait for a reply.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

pub struct UdpRendezvousChannel {
    socket: UdpSocket,
    server: SocketAddr,
    request_timeout: Duration,
    exchange: Mutex<()>,
}

impl UdpRendezvousChannel {
    /// Binds an ephemeral local socket of the server's address family.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Io`] if no local socket can be bound.
    pub async fn bind(server: SocketAddr, request_timeout: Duration) -> Result<Self, ChannelError> {
        let local = match server.ip() {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = UdpSocket::bind(local).await?;
        Ok(Self {
            socket,
            server,
            request_timeout,
            exchange: Mutex::new(()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ChannelError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server
    }

    fn drain_stale(&self, buf: &mut [u8]) {
        while let Ok((len, from)) = self.socket.try_recv_from(buf) {
            debug!(%from, len, "discarded stale datagram");
        }
    }
}

#[async_trait]
impl RendezvousChannel for UdpRendezvousChannel {
    async fn request(&self, request: &Request) -> Result<Response, ChannelError> {
        let bytes = encode_request(request)?;
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let _exchange = self.exchange.lock().await;

        self.drain_stale(&mut buf);
        self.socket.send_to(&bytes, self.server).await?;

        let deadline = Instant::now() + self.request_timeout;
        loop {
            let (len, from) = tokio::time::timeout_at(deadline, self.socket.recv_from(&mut buf))
                .await
                .map_err(|_| ChannelError::Timeout(self.request_timeout))??;
            if from != self.server {
                debug!(%from, "ignored datagram from unexpected sender");
                continue;
            }
            return Ok(decode_response(request.kind(), &buf[..len])?);
        }
    }

    async fn notify(&self, request: &Request) -> Result<(), ChannelError> {
        let bytes = encode_request(request)?;
        self.socket.send_to(&bytes, self.server).await?;
        Ok(())
    }
}
