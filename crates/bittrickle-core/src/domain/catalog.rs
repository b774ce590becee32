//! The published-file catalog.
//!
//! Each identity owns a set of announced filenames.  Entries survive logout
//! and liveness eviction: a returning user finds their files still published.
//! Visibility is decided at query time by intersecting with the set of
//! currently active identities, which the caller supplies.
//!
//! Filenames are opaque tokens here; whether the owner can actually serve the
//! file is only discovered when a peer connects.

use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Result of [`FileCatalog::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    AlreadyPublished,
}

/// Result of [`FileCatalog::unpublish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnpublishOutcome {
    Unpublished,
    NotPublished,
}

/// identity → set of filenames.
#[derive(Debug, Default)]
pub struct FileCatalog {
    entries: HashMap<String, BTreeSet<String>>,
}

impl FileCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `filename` to `owner`'s set.  Idempotent.
    pub fn publish(&mut self, owner: &str, filename: &str) -> PublishOutcome {
        let files = self.entries.entry(owner.to_string()).or_default();
        if files.insert(filename.to_string()) {
            PublishOutcome::Published
        } else {
            PublishOutcome::AlreadyPublished
        }
    }

    /// Removes `filename` from `owner`'s set.  An owner left with no files is
    /// dropped from the catalog entirely.
    pub fn unpublish(&mut self, owner: &str, filename: &str) -> UnpublishOutcome {
        let Some(files) = self.entries.get_mut(owner) else {
            return UnpublishOutcome::NotPublished;
        };
        if !files.remove(filename) {
            return UnpublishOutcome::NotPublished;
        }
        if files.is_empty() {
            self.entries.remove(owner);
        }
        UnpublishOutcome::Unpublished
    }

    pub fn owns(&self, owner: &str, filename: &str) -> bool {
        self.entries
            .get(owner)
            .is_some_and(|files| files.contains(filename))
    }

    /// `owner`'s files in lexical order.
    pub fn list_own(&self, owner: &str) -> Vec<String> {
        self.entries
            .get(owner)
            .map(|files| files.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Files containing `substring` (case-sensitive) published by an active
    /// identity other than `requester`, each with its active owners.
    ///
    /// Filenames the requester has published are left out even when others
    /// hold them too.
    pub fn search_with_owners<'a, I>(
        &self,
        requester: &str,
        substring: &str,
        active: I,
    ) -> BTreeMap<String, BTreeSet<String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let own = self.entries.get(requester);
        let mut hits: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for owner in active {
            if owner == requester {
                continue;
            }
            let Some(files) = self.entries.get(owner) else {
                continue;
            };
            for file in files {
                if !file.contains(substring) {
                    continue;
                }
                if own.is_some_and(|mine| mine.contains(file)) {
                    continue;
                }
                hits.entry(file.clone())
                    .or_default()
                    .insert(owner.to_string());
            }
        }
        hits
    }

    /// Distinct matching filenames in lexical order.
    ///
    /// See [`FileCatalog::search_with_owners`] for the matching rules.
    pub fn search<'a, I>(&self, requester: &str, substring: &str, active: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.search_with_owners(requester, substring, active)
            .into_keys()
            .collect()
    }

    /// Picks the active owner of `filename` to fetch from.
    ///
    /// When several active identities hold the file, the lexically smallest
    /// one wins so repeated lookups are stable.  The requester is not
    /// excluded.
    pub fn resolve_owner<'a, I>(&self, filename: &str, active: I) -> Option<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        active
            .into_iter()
            .filter(|owner| self.owns(owner, filename))
            .min()
            .map(str::to_string)
    }

    /// Number of identities with at least one published file.
    pub fn owner_count(&self) -> usize {
        self.entries.len()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
