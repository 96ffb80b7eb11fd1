//! Resolved-location cache keyed by lookup target.
//!
//! Entries older than the TTL are treated as absent on read and only
//! removed when `purge_stale` runs.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A resolved city with its fetch time.
#[derive(Debug, Clone)]
pub struct LocationEntry {
    pub city: String,
    pub fetched_at: Instant,
}

impl LocationEntry {
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// Thread-safe location cache. Clones share the same table.
#[derive(Debug, Clone)]
pub struct LocationCache {
    entries: Arc<DashMap<String, LocationEntry>>,
    ttl: Duration,
}

impl LocationCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// The cached city for `key`, if one was stored less than `ttl` ago.
    pub fn get_fresh(&self, key: &str) -> Option<String> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_fresh(self.ttl))
            .map(|entry| entry.city.clone())
    }

    pub fn insert(&self, key: impl Into<String>, city: impl Into<String>) {
        self.entries.insert(
            key.into(),
            LocationEntry {
                city: city.into(),
                fetched_at: Instant::now(),
            },
        );
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_stale(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(self.ttl));
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
