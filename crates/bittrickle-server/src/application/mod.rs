//! Application layer for the rendezvous server.
//!
//! - [`dispatch`] turns one request datagram into zero or one response.
//! - [`liveness`] periodically evicts sessions that stopped heartbeating.

pub mod dispatch;
pub mod liveness;
