//! Peer-to-peer file transfer over TCP.
//!
//! - [`listener`] serves files from the share directory to other peers.
//! - [`fetcher`] downloads a file from another peer's listener.
//!
//! Both sides speak the framing in [`bittrickle_core::protocol::transfer`].

pub mod fetcher;
pub mod listener;
