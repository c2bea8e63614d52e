// src/pipeline/refresh.rs

//! "Refresh or serve cached" pipeline.
//!
//! A fresh cache entry is returned without touching the network. Otherwise
//! groups are discovered, scraped in batches, cached and returned. When that
//! fails, an expired entry is served instead if one exists.

use std::sync::Arc;
use std::time::Instant;

use crate::error::{AppError, Result};
use crate::models::{CacheEntry, Config, GroupRecord, GroupStatistics};
use crate::services::{BatchOrchestrator, GroupDiscovery, GroupScraper};
use crate::storage::{CacheStore, LocalCache};
use crate::utils::http::{HttpFetcher, PageSource};

/// How a refresh request was answered.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// Served from a valid cache entry; no network activity
    Cached(CacheEntry),
    /// Crawled now and cached
    Fresh {
        entry: CacheEntry,
        duration_ms: u64,
        statistics: GroupStatistics,
    },
    /// The crawl failed; an expired entry is served instead
    Stale { entry: CacheEntry, error: String },
}

impl RefreshOutcome {
    pub fn entry(&self) -> &CacheEntry {
        match self {
            Self::Cached(entry) => entry,
            Self::Fresh { entry, .. } => entry,
            Self::Stale { entry, .. } => entry,
        }
    }

    /// Whether the groups came from the cache.
    pub fn is_cached(&self) -> bool {
        !matches!(self, Self::Fresh { .. })
    }
}

/// The group crawling pipeline with its collaborators.
pub struct GroupsPipeline {
    store: Arc<dyn CacheStore>,
    discovery: GroupDiscovery,
    scraper: Arc<GroupScraper>,
    orchestrator: BatchOrchestrator,
}

impl GroupsPipeline {
    /// Wire the pipeline with an explicit page source and cache store.
    pub fn new(
        config: &Config,
        source: Arc<dyn PageSource>,
        store: Arc<dyn CacheStore>,
    ) -> Result<Self> {
        let scraper = Arc::new(GroupScraper::new(
            config.portal.clone(),
            Arc::clone(&source),
        )?);
        Ok(Self {
            store,
            discovery: GroupDiscovery::new(config.portal.clone(), source)?,
            orchestrator: BatchOrchestrator::new(Arc::clone(&scraper), &config.crawler),
            scraper,
        })
    }

    /// Wire the pipeline against the live portal and the configured cache file.
    pub fn from_config(config: &Config) -> Result<Self> {
        let source: Arc<dyn PageSource> = Arc::new(HttpFetcher::new(&config.crawler)?);
        let store: Arc<dyn CacheStore> = Arc::new(LocalCache::from_config(&config.cache));
        Self::new(config, source, store)
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Serve the cached groups, or crawl when the cache is cold or expired.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        if let Some(entry) = self.store.load().await {
            log::info!(
                "Serving {} cached groups from {}",
                entry.groups.len(),
                entry.parsed_at()
            );
            return Ok(RefreshOutcome::Cached(entry));
        }

        self.crawl_or_stale().await
    }

    /// Crawl now regardless of the cache, falling back to a stale entry.
    pub async fn crawl_or_stale(&self) -> Result<RefreshOutcome> {
        let start = Instant::now();

        match self.crawl().await {
            Ok(entry) => {
                self.store.save(&entry).await;
                Ok(RefreshOutcome::Fresh {
                    statistics: entry.statistics(),
                    duration_ms: start.elapsed().as_millis() as u64,
                    entry,
                })
            }
            Err(e) => {
                log::error!("Group crawl failed: {}", e);
                match self.store.load_stale().await {
                    Some(entry) => {
                        log::warn!("Serving stale cache from {}", entry.parsed_at());
                        Ok(RefreshOutcome::Stale {
                            entry,
                            error: e.to_string(),
                        })
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// Discover, scrape and aggregate into a new cache entry.
    async fn crawl(&self) -> Result<CacheEntry> {
        log::info!("Collecting group numbers...");
        let all = self.discovery.collect_group_numbers().await;
        if all.is_empty() {
            return Err(AppError::discovery("No groups found in any category"));
        }

        let total = all.len();
        let outcome = self.orchestrator.run(all).await;

        log::info!(
            "Found {} groups, processed {}: {} kept, {} failed, {} missing, {} empty",
            total,
            outcome.attempted,
            outcome.groups.len(),
            outcome.failed,
            outcome.missing,
            outcome.empty
        );

        Ok(CacheEntry::new(outcome.groups, total))
    }

    /// Scrape a single group, bypassing the cache.
    pub async fn group(&self, group_id: &str) -> Result<Option<GroupRecord>> {
        self.scraper.fetch_group(group_id).await
    }

    /// All discovered group numbers, ascending.
    pub async fn discover(&self) -> Result<Vec<u32>> {
        let all = self.discovery.collect_group_numbers().await;
        if all.is_empty() {
            return Err(AppError::discovery("No groups found in any category"));
        }
        let mut numbers: Vec<u32> = all.iter().filter_map(|n| n.parse().ok()).collect();
        numbers.sort_unstable();
        Ok(numbers)
    }

    /// Drop the cached result.
    pub async fn invalidate(&self) {
        self.store.invalidate().await;
        log::info!("Cache cleared");
    }
}
