//! bittrickle-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # Layers
//!
//! - `application` – the session state machine, command parsing, and the
//!   heartbeat loop.  Talks to the outside world only through the traits in
//!   `application::ports`.
//! - `infrastructure` – the UDP rendezvous channel, the TCP transfer listener
//!   and fetcher, and config file loading.

pub mod application;
pub mod infrastructure;
