//! Session registry: who is logged in, from which origin, and since when.
//!
//! # Session lifecycle (for beginners)
//!
//! ```text
//!   AUTH ok ──►  Active  ──► LOGOUT            (remove)
//!                  │  ▲
//!      any request │  │ touch refreshes last_heartbeat
//!                  ▼  │
//!               silence > liveness_timeout ──► swept
//! ```
//!
//! Sessions are keyed by identity (at most one per identity) and indexed by
//! origin address, because datagrams only carry the sender's address: the
//! server learns *who* sent a `lap` by looking up *where* it came from.
//!
//! # Eviction cost
//!
//! [`SessionRegistry::sweep`] scans every session: O(n) per sweep.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::domain::credentials::CredentialStore;

/// Maximum silence before a session is considered dead.
pub const DEFAULT_LIVENESS_TIMEOUT: Duration = Duration::from_secs(3);

/// Why an authentication attempt was refused.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// Another session already holds this identity, from any address.
    #[error("identity is already active")]
    AlreadyActive,
    /// Unknown identity or wrong secret.
    #[error("invalid credentials")]
    InvalidCredentials,
}

/// A currently logged-in identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub identity: String,
    /// Source address of the datagrams this session sends.
    pub origin: SocketAddr,
    /// TCP port of the session's transfer listener.
    pub transfer_port: u16,
    pub last_heartbeat: Instant,
}

impl Session {
    /// Address other peers connect to when fetching from this session.
    pub fn transfer_endpoint(&self) -> SocketAddr {
        SocketAddr::new(self.origin.ip(), self.transfer_port)
    }
}

/// Authoritative map of active sessions.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: HashMap<String, Session>,
    origins: HashMap<SocketAddr, String>,
    liveness_timeout: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_LIVENESS_TIMEOUT)
    }
}

impl SessionRegistry {
    pub fn new(liveness_timeout: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            origins: HashMap::new(),
            liveness_timeout,
        }
    }

    pub fn liveness_timeout(&self) -> Duration {
        self.liveness_timeout
    }

    /// Admits `identity` from `origin` if its secret checks out and nobody
    /// else currently holds it.
    ///
    /// If `origin` was already bound to a *different* identity, that older
    /// session is replaced: one socket speaks for one identity at a time.
    ///
    /// # Errors
    ///
    /// - [`AuthError::AlreadyActive`] if any session holds `identity`; this
    ///   is checked before the secret.
    /// - [`AuthError::InvalidCredentials`] if `credentials` rejects the pair.
    pub fn authenticate(
        &mut self,
        identity: &str,
        secret: &str,
        origin: SocketAddr,
        transfer_port: u16,
        credentials: &dyn CredentialStore,
        now: Instant,
    ) -> Result<&Session, AuthError> {
        if self.sessions.contains_key(identity) {
            return Err(AuthError::AlreadyActive);
        }
        if !credentials.verify(identity, secret) {
            return Err(AuthError::InvalidCredentials);
        }

        if let Some(previous) = self.origins.remove(&origin) {
            self.sessions.remove(&previous);
        }
        self.origins.insert(origin, identity.to_string());
        let session = Session {
            identity: identity.to_string(),
            origin,
            transfer_port,
            last_heartbeat: now,
        };
        Ok(self.sessions.entry(identity.to_string()).or_insert(session))
    }

    /// Refreshes the session bound to `origin`.
    ///
    /// Returns `false` (and does nothing) for unknown origins; a heartbeat
    /// from an expired session is simply dropped.
    pub fn touch(&mut self, origin: SocketAddr, now: Instant) -> bool {
        let Some(identity) = self.origins.get(&origin) else {
            return false;
        };
        match self.sessions.get_mut(identity) {
            Some(session) => {
                session.last_heartbeat = now;
                true
            }
            None => false,
        }
    }

    /// Removes every session silent for strictly longer than the liveness
    /// timeout, returning the evicted sessions.
    pub fn sweep(&mut self, now: Instant) -> Vec<Session> {
        let timeout = self.liveness_timeout;
        let stale: Vec<String> = self
            .sessions
            .values()
            .filter(|s| now.saturating_duration_since(s.last_heartbeat) > timeout)
            .map(|s| s.identity.clone())
            .collect();

        stale
            .iter()
            .filter_map(|identity| self.remove(identity))
            .collect()
    }

    /// Explicit logout.
    pub fn remove(&mut self, identity: &str) -> Option<Session> {
        let session = self.sessions.remove(identity)?;
        self.origins.remove(&session.origin);
        Some(session)
    }

    /// Identity of the session whose datagrams come from `origin`.
    pub fn identity_at(&self, origin: SocketAddr) -> Option<&str> {
        self.origins.get(&origin).map(String::as_str)
    }

    pub fn get(&self, identity: &str) -> Option<&Session> {
        self.sessions.get(identity)
    }

    pub fn is_active(&self, identity: &str) -> bool {
        self.sessions.contains_key(identity)
    }

    /// All active identities in lexical order.
    pub fn active_identities(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.sessions.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
