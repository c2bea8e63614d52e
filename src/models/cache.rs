//! Cached crawl result and derived statistics.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::models::GroupRecord;

/// The aggregated result of one successful crawl.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Sorted ascending by group number
    pub groups: Vec<GroupRecord>,

    /// Creation time, epoch milliseconds
    pub timestamp: i64,

    /// Groups discovered before filtering
    pub total_groups: usize,

    /// Groups retained; equals `groups.len()`
    pub processed_groups: usize,
}

impl CacheEntry {
    /// Build an entry stamped with the current time.
    pub fn new(groups: Vec<GroupRecord>, total_groups: usize) -> Self {
        Self::with_timestamp(groups, total_groups, Utc::now().timestamp_millis())
    }

    pub fn with_timestamp(groups: Vec<GroupRecord>, total_groups: usize, timestamp: i64) -> Self {
        Self {
            processed_groups: groups.len(),
            groups,
            timestamp,
            total_groups,
        }
    }

    /// Age in milliseconds relative to `now_ms`.
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.timestamp
    }

    /// ISO 8601 rendering of the creation time.
    pub fn parsed_at(&self) -> String {
        iso_millis(self.timestamp)
    }

    pub fn statistics(&self) -> GroupStatistics {
        GroupStatistics::from_groups(&self.groups)
    }
}

/// Group counts by course and by institution.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroupStatistics {
    pub by_course: BTreeMap<u32, usize>,
    pub by_institution: BTreeMap<String, usize>,
}

impl GroupStatistics {
    pub fn from_groups(groups: &[GroupRecord]) -> Self {
        let mut stats = Self::default();
        for group in groups {
            *stats.by_course.entry(group.course).or_default() += 1;
            *stats
                .by_institution
                .entry(group.institution.clone())
                .or_default() += 1;
        }
        stats
    }
}

/// Format epoch milliseconds as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn iso_millis(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}
