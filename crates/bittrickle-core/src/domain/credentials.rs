//! Credential lookup used by [`crate::SessionRegistry::authenticate`].

use std::collections::HashMap;

/// Read-only identity → secret lookup.
///
/// The server loads its implementation once at startup; nothing mutates it
/// afterwards.
pub trait CredentialStore: Send + Sync {
    /// Returns `true` if `identity` is known and `secret` matches it.
    fn verify(&self, identity: &str, secret: &str) -> bool;
}

impl CredentialStore for HashMap<String, String> {
    fn verify(&self, identity: &str, secret: &str) -> bool {
        self.get(identity).is_some_and(|expected| expected == secret)
    }
}
