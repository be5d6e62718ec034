//! Cache types.

use metrica_core::output::Artifact;
use tokio::time::Instant;

/// A cached artifact with its expiry deadline.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub artifact: Artifact,
    /// `None` means the entry lives until the process restarts.
    pub expires_at: Option<Instant>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub expirations: u64,
}
