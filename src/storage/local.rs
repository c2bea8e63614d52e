//! Local filesystem cache implementation.
//!
//! Keeps the latest [`CacheEntry`] in memory and mirrors it to a JSON file so
//! that a restarted process can serve it without crawling.
//!
//! Freshness is measured from the entry's own `timestamp`, never from the
//! time it was read. An entry exactly `ttl` old is expired.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::error::{AppError, Result};
use crate::models::{CacheConfig, CacheEntry};
use crate::storage::{CacheLookup, CacheStore};

/// Suffix source for temp files, so concurrent writers never share one.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Memory + file cache backend.
pub struct LocalCache {
    path: PathBuf,
    ttl_ms: i64,
    memory: RwLock<Option<CacheEntry>>,
}

impl LocalCache {
    /// Create a cache persisting to `path` with the given validity window.
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl_ms: ttl.as_millis() as i64,
            memory: RwLock::new(None),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(&config.path, config.ttl())
    }

    /// Location of the cache file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_fresh(&self, entry: &CacheEntry, now_ms: i64) -> bool {
        entry.age_ms(now_ms) < self.ttl_ms
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    /// Sibling temp path unique to this process and call.
    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.path
            .with_file_name(format!(".{name}.{}.{n}.tmp", std::process::id()))
    }

    /// Write the entry atomically (write to temp, then rename).
    pub async fn persist(&self, entry: &CacheEntry) -> Result<()> {
        self.ensure_dir().await?;
        let bytes = serde_json::to_vec_pretty(entry)?;

        let tmp = self.temp_path();
        let written: std::io::Result<()> = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(&bytes).await?;
            file.flush().await?;
            drop(file);
            tokio::fs::rename(&tmp, &self.path).await
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(AppError::Io(e));
        }
        Ok(())
    }

    /// Read the file, returning None if it doesn't exist.
    async fn read_file(&self) -> Result<Option<CacheEntry>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[async_trait]
impl CacheStore for LocalCache {
    async fn lookup_at(&self, now_ms: i64) -> CacheLookup {
        let in_memory = self.memory.read().await.clone();
        if let Some(entry) = &in_memory {
            if self.is_fresh(entry, now_ms) {
                return CacheLookup::Fresh(entry.clone());
            }
        }

        match self.read_file().await {
            Ok(Some(entry)) if self.is_fresh(&entry, now_ms) => {
                *self.memory.write().await = Some(entry.clone());
                CacheLookup::Fresh(entry)
            }
            Ok(Some(entry)) => CacheLookup::Expired(entry),
            Ok(None) => match in_memory {
                Some(entry) => CacheLookup::Expired(entry),
                None => CacheLookup::Missing,
            },
            Err(e) => {
                log::warn!("Cache file {} unreadable: {}", self.path.display(), e);
                CacheLookup::Corrupt(e.to_string())
            }
        }
    }

    async fn save(&self, entry: &CacheEntry) {
        *self.memory.write().await = Some(entry.clone());

        if let Err(e) = self.persist(entry).await {
            log::warn!(
                "Failed to persist cache to {}: {}",
                self.path.display(),
                e
            );
        }
    }

    async fn load_stale(&self) -> Option<CacheEntry> {
        if let Some(entry) = self.memory.read().await.clone() {
            return Some(entry);
        }
        self.read_file().await.ok().flatten()
    }

    async fn invalidate(&self) {
        *self.memory.write().await = None;
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::debug!("Cache file {} not removed: {}", self.path.display(), e);
            }
        }
    }
}
