//! Storage abstractions for the crawl result cache.
//!
//! Two tiers:
//! - Memory: a single slot owned by the store, last write wins
//! - Disk: one JSON file holding the same [`CacheEntry`]
//!
//! ## Directory Structure
//!
//! ```text
//! .cache/
//! └── groups.json          # Latest CacheEntry
//! ```

pub mod local;

use async_trait::async_trait;
use chrono::Utc;

use crate::models::CacheEntry;

// Re-export for convenience
pub use local::LocalCache;

/// What a cache lookup found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// An entry within the validity window
    Fresh(CacheEntry),
    /// An entry past the validity window
    Expired(CacheEntry),
    /// Nothing cached yet
    Missing,
    /// The cache file exists but could not be read or parsed
    Corrupt(String),
}

impl CacheLookup {
    /// The entry, only if still valid.
    pub fn fresh(self) -> Option<CacheEntry> {
        match self {
            Self::Fresh(entry) => Some(entry),
            _ => None,
        }
    }
}

/// Trait for crawl result cache backends.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Inspect the cache as of `now_ms` (epoch milliseconds).
    async fn lookup_at(&self, now_ms: i64) -> CacheLookup;

    /// Replace the cached entry.
    ///
    /// Persistence failures are logged; the in-memory copy stays
    /// authoritative for the lifetime of the store.
    async fn save(&self, entry: &CacheEntry);

    /// Any cached entry, ignoring expiry.
    async fn load_stale(&self) -> Option<CacheEntry>;

    /// Drop the cached entry from every tier.
    async fn invalidate(&self);

    /// The cached entry if still valid.
    async fn load(&self) -> Option<CacheEntry> {
        self.lookup_at(Utc::now().timestamp_millis()).await.fresh()
    }
}
