//! TOML configuration for the rendezvous server.
//!
//! The file is optional.  Every field has a default, so a partial file only
//! needs the settings it changes:
//!
//! ```toml
//! [network]
//! bind_address = "0.0.0.0"
//!
//! [liveness]
//! timeout_ms = 3000
//! sweep_interval_ms = 1000
//!
//! [credentials]
//! path = "/etc/bittrickle/credentials.txt"
//! ```
//!
//! Command-line flags override whatever the file says (see `main.rs`).

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

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

    /// A value parsed but cannot be used.
    #[error("invalid config value: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub liveness: LivenessConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// Address the datagram socket binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LivenessConfig {
    /// Silence after which a session is evicted.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Interval between sweeps.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CredentialsConfig {
    #[serde(default = "default_credentials_path")]
    pub path: PathBuf,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}
fn default_timeout_ms() -> u64 {
    3000
}
fn default_sweep_interval_ms() -> u64 {
    1000
}
fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.txt")
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            path: default_credentials_path(),
        }
    }
}

impl ServerConfig {
    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness.timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.liveness.sweep_interval_ms)
    }

    /// Rejects values the server cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero timeout or sweep interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.liveness.timeout_ms == 0 {
            return Err(ConfigError::Invalid("liveness.timeout_ms must be > 0".into()));
        }
        if self.liveness.sweep_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "liveness.sweep_interval_ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Parses and validates config text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for malformed TOML and
/// [`ConfigError::Invalid`] for unusable values.
pub fn parse_config(content: &str) -> Result<ServerConfig, ConfigError> {
    let config: ServerConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Loads the config at `path`, or the defaults when no path is given.
///
/// An explicitly named file must exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
/// [`parse_config`].
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(ServerConfig::default());
    };
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_timings() {
        // Arrange / Act
        let cfg = ServerConfig::default();

        // Assert
        assert_eq!(cfg.liveness_timeout(), Duration::from_secs(3));
        assert_eq!(cfg.sweep_interval(), Duration::from_secs(1));
        assert_eq!(cfg.network.bind_address, IpAddr::from([127, 0, 0, 1]));
        assert_eq!(cfg.credentials.path, PathBuf::from("credentials.txt"));
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        assert_eq!(parse_config("").unwrap(), ServerConfig::default());
    }

    #[test]
    fn test_partial_file_overrides_only_named_fields() {
        let cfg = parse_config("[liveness]\ntimeout_ms = 500\n").unwrap();

        assert_eq!(cfg.liveness.timeout_ms, 500);
        assert_eq!(cfg.liveness.sweep_interval_ms, 1000);
        assert_eq!(cfg.network, NetworkConfig::default());
    }

    #[test]
    fn test_zero_sweep_interval_is_invalid() {
        let err = parse_config("[liveness]\nsweep_interval_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_bad_bind_address_is_parse_error() {
        let err = parse_config("[network]\nbind_address = \"not-an-ip\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_without_path_is_default() {
        assert_eq!(load_config(None).unwrap(), ServerConfig::default());
    }

    #[test]
    fn test_load_named_missing_file_is_io_error() {
        let path = std::env::temp_dir().join(format!("absent-{}.toml", uuid::Uuid::new_v4()));
        assert!(matches!(load_config(Some(&path)), Err(ConfigError::Io { .. })));
    }
}
