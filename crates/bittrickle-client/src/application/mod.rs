//! Application layer for the client.
//!
//! - [`command`] parses what the user types.
//! - [`ports`] declares the traits the infrastructure layer implements.
//! - [`session_agent`] runs the login state machine and executes commands.
//! - [`heartbeat`] keeps the server-side session alive.
//! - [`active_session`] owns the background tasks of a logged-in session.

pub mod active_session;
pub mod command;
pub mod heartbeat;
pub mod ports;
pub mod session_agent;
