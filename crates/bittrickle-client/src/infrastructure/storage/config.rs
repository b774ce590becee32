//! TOML configuration for the BitTrickle client.
//!
//! All sections are optional:
//!
//! ```toml
//! [network]
//! server_host = "127.0.0.1"
//! request_timeout_ms = 2000
//! connect_timeout_ms = 3000
//!
//! [session]
//! heartbeat_interval_ms = 2000
//! heartbeat_max_failures = 3
//!
//! [transfer]
//! share_dir = "."
//! download_dir = "."
//! max_concurrent_uploads = 16
//! upload_idle_timeout_ms = 30000
//! ```

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::heartbeat::HeartbeatConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// Address of the rendezvous server.
    #[serde(default = "default_server_host")]
    pub server_host: IpAddr,
    /// Wait for a reply to each request.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Limit for reaching a peer's transfer listener.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Consecutive send failures before the emitter stops.
    #[serde(default = "default_heartbeat_max_failures")]
    pub heartbeat_max_failures: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferConfig {
    /// Directory served to other peers and checked by `pub`.
    #[serde(default = "default_dir")]
    pub share_dir: PathBuf,
    /// Directory downloads are written to.
    #[serde(default = "default_dir")]
    pub download_dir: PathBuf,
    #[serde(default = "default_max_concurrent_uploads")]
    pub max_concurrent_uploads: usize,
    /// Longest an upload may wait on a peer that stopped reading.
    #[serde(default = "default_upload_idle_timeout_ms")]
    pub upload_idle_timeout_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_server_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}
fn default_request_timeout_ms() -> u64 {
    2000
}
fn default_connect_timeout_ms() -> u64 {
    3000
}
fn default_heartbeat_interval_ms() -> u64 {
    2000
}
fn default_heartbeat_max_failures() -> u32 {
    3
}
fn default_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_max_concurrent_uploads() -> usize {
    16
}
fn default_upload_idle_timeout_ms() -> u64 {
    30_000
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_host: default_server_host(),
            request_timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            heartbeat_max_failures: default_heartbeat_max_failures(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            share_dir: default_dir(),
            download_dir: default_dir(),
            max_concurrent_uploads: default_max_concurrent_uploads(),
            upload_idle_timeout_ms: default_upload_idle_timeout_ms(),
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.network.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.network.connect_timeout_ms)
    }

    pub fn upload_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.transfer.upload_idle_timeout_ms)
    }

    pub fn heartbeat(&self) -> HeartbeatConfig {
        HeartbeatConfig {
            interval: Duration::from_millis(self.session.heartbeat_interval_ms),
            max_failures: self.session.heartbeat_max_failures,
        }
    }

    /// Rejects values the client cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first zero-valued setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("network.request_timeout_ms", self.network.request_timeout_ms == 0),
            ("network.connect_timeout_ms", self.network.connect_timeout_ms == 0),
            ("session.heartbeat_interval_ms", self.session.heartbeat_interval_ms == 0),
            ("session.heartbeat_max_failures", self.session.heartbeat_max_failures == 0),
            ("transfer.max_concurrent_uploads", self.transfer.max_concurrent_uploads == 0),
            ("transfer.upload_idle_timeout_ms", self.transfer.upload_idle_timeout_ms == 0),
        ];
        match checks.iter().find(|(_, zero)| *zero) {
            Some((name, _)) => Err(ConfigError::Invalid(format!("{name} must be > 0"))),
            None => Ok(()),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Parses and validates config text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] or [`ConfigError::Invalid`].
pub fn parse_config(content: &str) -> Result<ClientConfig, ConfigError> {
    let config: ClientConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Loads the config at `path`, or the defaults when no path is given.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if a named file cannot be read, otherwise as
/// [`parse_config`].
pub fn load_config(path: Option<&Path>) -> Result<ClientConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(ClientConfig::default());
    };
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
