//! Region routing table.
//!
//! # Responsibilities
//! - Map ISO 3166-1 alpha-2 country codes to backend targets
//! - Hold the default target under the reserved `"default"` key
//! - Publish full rebuilds atomically
//!
//! # Design Decisions
//! - Readers load an immutable `RegionMap` through `ArcSwap` (no read lock)
//! - Writers are serialized by a mutex and always publish a fully built map
//! - Keys are stored lowercase; lookups lowercase their input

use arc_swap::ArcSwap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::discovery::ServerDefinition;

/// Reserved key for the fallback target. Never a valid alpha-2 code.
pub const DEFAULT_KEY: &str = "default";

/// One published generation of the routing table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegionMap {
    generation: u64,
    entries: HashMap<String, String>,
}

impl RegionMap {
    /// Look up the target for a country code (case-insensitive).
    pub fn get(&self, country_code: &str) -> Option<&str> {
        match self.entries.get(country_code) {
            Some(target) => Some(target.as_str()),
            None => self
                .entries
                .get(&country_code.to_ascii_lowercase())
                .map(String::as_str),
        }
    }

    /// The fallback target, if one is registered.
    pub fn default_target(&self) -> Option<&str> {
        self.get(DEFAULT_KEY)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by key, for display.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort();
        entries
    }

    /// First-write-wins insert. Returns false if the key is already taken.
    fn insert(&mut self, key: &str, target: &str) -> bool {
        let key = key.to_ascii_lowercase();
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, target.to_string());
        true
    }
}

/// Result of a full table rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplaceSummary {
    /// Generation number of the newly published table.
    pub generation: u64,
    /// Keys written (the default slot counts as one).
    pub installed: usize,
    /// Entries dropped because their key was already taken in this batch.
    pub skipped_duplicates: usize,
    /// Entries with an invalid country code, or neither a region nor a default tag.
    pub rejected: usize,
}

/// Concurrency-safe region routing table.
#[derive(Debug, Default)]
pub struct RoutingTable {
    current: ArcSwap<RegionMap>,
    writer: Mutex<()>,
}

impl RoutingTable {
    /// Create an empty table (generation 0).
    pub fn new() -> Self {
        Self::default()
    }

    /// Current self-consistent view of the table.
    pub fn snapshot(&self) -> Arc<RegionMap> {
        self.current.load_full()
    }

    pub fn get(&self, country_code: &str) -> Option<String> {
        self.current.load().get(country_code).map(str::to_string)
    }

    pub fn default_target(&self) -> Option<String> {
        self.get(DEFAULT_KEY)
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    /// Register a target for a country code.
    ///
    /// Returns `false` without changing anything if the code already has a target.
    pub fn set(&self, country_code: &str, target: &str) -> bool {
        let _guard = self.lock_writer();
        let mut next = RegionMap::clone(&self.current.load());
        if !next.insert(country_code, target) {
            return false;
        }
        next.generation += 1;
        self.current.store(Arc::new(next));
        true
    }

    /// Register the fallback target. Same first-write-wins rule as [`set`](Self::set).
    pub fn set_default(&self, target: &str) -> bool {
        self.set(DEFAULT_KEY, target)
    }

    /// Remove the target for a country code, if any.
    pub fn delete(&self, country_code: &str) {
        let _guard = self.lock_writer();
        let key = country_code.to_ascii_lowercase();
        if !self.current.load().entries.contains_key(&key) {
            return;
        }
        let mut next = RegionMap::clone(&self.current.load());
        next.entries.remove(&key);
        next.generation += 1;
        self.current.store(Arc::new(next));
    }

    /// Replace the whole table with one built from `servers`.
    ///
    /// The new map is built off to the side and published with a single
    /// pointer swap, so readers see either the previous generation or this one.
    pub fn replace_all(&self, servers: &[ServerDefinition]) -> ReplaceSummary {
        let _guard = self.lock_writer();
        let mut next = RegionMap {
            generation: self.current.load().generation + 1,
            entries: HashMap::with_capacity(servers.len() + 1),
        };
        let mut summary = ReplaceSummary {
            generation: next.generation,
            ..ReplaceSummary::default()
        };

        for server in servers {
            let has_region = !server.country_code.is_empty();
            if has_region && !is_alpha2(&server.country_code) {
                tracing::warn!(
                    country_code = %server.country_code,
                    backend = %server.target,
                    "Ignoring server with invalid country code"
                );
                summary.rejected += 1;
                continue;
            }
            if !has_region && !server.is_default {
                tracing::debug!(backend = %server.target, "Ignoring server without region or default tag");
                summary.rejected += 1;
                continue;
            }

            if server.is_default {
                tracing::info!(backend = %server.target, "Setting up default routing");
                record(&mut summary, next.insert(DEFAULT_KEY, &server.target));
            }
            if has_region {
                tracing::info!(
                    region = %server.country_code.to_ascii_uppercase(),
                    backend = %server.target,
                    "Setting up region routing"
                );
                record(&mut summary, next.insert(&server.country_code, &server.target));
            }
        }

        self.current.store(Arc::new(next));
        summary
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn record(summary: &mut ReplaceSummary, inserted: bool) {
    if inserted {
        summary.installed += 1;
    } else {
        summary.skipped_duplicates += 1;
    }
}

/// True for two ASCII letters, the shape of an ISO 3166-1 alpha-2 code.
pub fn is_alpha2(code: &str) -> bool {
    code.len() == 2 && code.bytes().all(|b| b.is_ascii_alphabetic())
}
