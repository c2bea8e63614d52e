// src/services/batch.rs

//! Batch orchestrator.
//!
//! Processes discovered group numbers in fixed-size batches. Requests inside
//! a batch run concurrently; batches run one after another with a pause in
//! between. A failing group never affects its siblings.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};

use crate::models::{CrawlerConfig, GroupRecord};
use crate::services::GroupScraper;

/// Summary of a batch run.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Records with students, sorted by number
    pub groups: Vec<GroupRecord>,
    /// Ids processed after the per-run cap
    pub attempted: usize,
    /// Fetches that errored
    pub failed: usize,
    /// Pages that did not show the group
    pub missing: usize,
    /// Records dropped for having no students
    pub empty: usize,
}

/// Runs group scrapes in throttled batches.
pub struct BatchOrchestrator {
    scraper: Arc<GroupScraper>,
    batch_size: usize,
    max_groups: usize,
    request_delay: Duration,
    batch_pause: Duration,
}

impl BatchOrchestrator {
    pub fn new(scraper: Arc<GroupScraper>, config: &CrawlerConfig) -> Self {
        Self {
            scraper,
            batch_size: config.batch_size.max(1),
            max_groups: config.max_groups_per_run,
            request_delay: config.request_delay(),
            batch_pause: config.batch_pause(),
        }
    }

    /// Scrape the given ids and return the non-empty records.
    pub async fn run<I, S>(&self, all_ids: I) -> BatchOutcome
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids = select_ids(all_ids, self.max_groups);
        let batches: Vec<&[String]> = ids.chunks(self.batch_size).collect();
        let batch_count = batches.len();

        let mut outcome = BatchOutcome {
            attempted: ids.len(),
            ..BatchOutcome::default()
        };
        let mut collected = Vec::new();

        for (index, batch) in batches.into_iter().enumerate() {
            log::info!(
                "Batch {}/{} (groups {}-{})",
                index + 1,
                batch_count,
                batch.first().map(String::as_str).unwrap_or(""),
                batch.last().map(String::as_str).unwrap_or("")
            );

            let mut results = stream::iter(batch.iter().cloned())
                .map(|id: String| async move {
                    if !self.request_delay.is_zero() {
                        tokio::time::sleep(self.request_delay).await;
                    }
                    let result = self.scraper.fetch_group(&id).await;
                    (id, result)
                })
                .buffer_unordered(batch.len());

            while let Some((id, result)) = results.next().await {
                match result {
                    Ok(Some(record)) => collected.push(record),
                    Ok(None) => outcome.missing += 1,
                    Err(e) => {
                        outcome.failed += 1;
                        log::warn!("Failed to scrape group {}: {}", id, e);
                    }
                }
            }

            log::info!(
                "Progress: {}% ({}/{} groups)",
                (index + 1) * 100 / batch_count,
                collected.len(),
                outcome.attempted
            );

            if index + 1 < batch_count && !self.batch_pause.is_zero() {
                tokio::time::sleep(self.batch_pause).await;
            }
        }

        let before = collected.len();
        outcome.groups = finalize(collected);
        outcome.empty = before - outcome.groups.len();
        outcome
    }
}

/// Sort ids numerically and keep at most `max` of them.
///
/// Ids that are not numbers sort last, in string order.
pub fn select_ids<I, S>(all_ids: I, max: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut ids: Vec<String> = all_ids.into_iter().map(Into::into).collect();
    ids.sort_by(|a, b| {
        let key = |s: &str| s.parse::<u64>().unwrap_or(u64::MAX);
        key(a).cmp(&key(b)).then_with(|| a.cmp(b))
    });
    ids.dedup();
    ids.truncate(max);
    ids
}

/// Drop records without students and sort by group number.
pub fn finalize(mut groups: Vec<GroupRecord>) -> Vec<GroupRecord> {
    groups.retain(GroupRecord::has_students);
    groups.sort_by_key(|g| g.number);
    groups
}
