//! Startup-time file loading: server configuration and the credential file.

pub mod config;
pub mod credentials;
