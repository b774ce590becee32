//! Credential file loading.
//!
//! # File format
//!
//! ```text
//! # identity  secret
//! alice pw1
//! bob   pw2
//! ```
//!
//! One `identity secret` pair per line, separated by whitespace.  Blank lines
//! and lines starting with `#` are skipped.  Anything else without exactly two
//! fields stops the server from starting.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

use bittrickle_core::CredentialStore;

/// Error type for credential file loading.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("I/O error reading credentials at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line did not contain exactly `identity secret`.
    #[error("line {line}: expected `identity secret`, found {found} field(s)")]
    Malformed { line: usize, found: usize },
}

/// Identity → secret table loaded once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialFile {
    entries: HashMap<String, String>,
}

impl CredentialFile {
    /// Parses credential file text.
    ///
    /// A repeated identity keeps its last secret.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Malformed`] naming the first bad line
    /// (1-based).
    pub fn parse(content: &str) -> Result<Self, CredentialError> {
        let mut entries = HashMap::new();

        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [identity, secret] = fields[..] else {
                return Err(CredentialError::Malformed {
                    line: index + 1,
                    found: fields.len(),
                });
            };
            if entries
                .insert(identity.to_string(), secret.to_string())
                .is_some()
            {
                warn!(identity, line = index + 1, "duplicate identity in credential file");
            }
        }

        Ok(Self { entries })
    }

    /// Reads and parses the credential file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Io`] if the file cannot be read and
    /// [`CredentialError::Malformed`] for a bad line.
    pub fn load(path: &Path) -> Result<Self, CredentialError> {
        let content = std::fs::read_to_string(path).map_err(|source| CredentialError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CredentialStore for CredentialFile {
    fn verify(&self, identity: &str, secret: &str) -> bool {
        self.entries.verify(identity, secret)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
