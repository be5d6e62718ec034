//! TTL store for finished rendering artifacts.

use crate::types::{CacheEntry, CacheStats};
use dashmap::DashMap;
use metrica_core::RequestKey;
use metrica_core::output::Artifact;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// In-memory artifact cache with lazy expiry.
///
/// Entries are only checked when read; an expired entry is dropped on that read
/// and overwritten by the next `put` for the same key. There is no sweeper.
pub struct ResponseCache {
    entries: DashMap<RequestKey, CacheEntry>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
    expirations: AtomicU64,
}

impl ResponseCache {
    /// Create a cache. A zero `default_ttl` keeps entries until restart.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            insertions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Look up a live artifact.
    pub fn get(&self, key: &RequestKey) -> Option<Artifact> {
        let now = Instant::now();
        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some()
        {
            debug!(key = %key, "Cache entry expired");
            self.expirations.fetch_add(1, Ordering::Relaxed);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        match self.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.artifact.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store an artifact. A missing or zero `ttl` falls back to the default.
    pub fn put(&self, key: RequestKey, artifact: Artifact, ttl: Option<Duration>) {
        let ttl = self.resolve_ttl(ttl);
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        debug!(key = %key, ttl_ms = ?ttl.map(|t| t.as_millis()), bytes = artifact.len(), "Caching artifact");
        self.entries.insert(
            key,
            CacheEntry {
                artifact,
                expires_at,
            },
        );
        self.insertions.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of distinct keys still alive.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            insertions: self.insertions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }

    fn resolve_ttl(&self, requested: Option<Duration>) -> Option<Duration> {
        let ttl = requested
            .filter(|ttl| !ttl.is_zero())
            .unwrap_or(self.default_ttl);
        (!ttl.is_zero()).then_some(ttl)
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(30 * 60))
    }
}
