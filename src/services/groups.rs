// src/services/groups.rs

//! Single-group scraper: fetch the search page, then extract.

use std::sync::Arc;

use crate::error::Result;
use crate::models::{GroupRecord, PortalConfig};
use crate::services::GroupExtractor;
use crate::utils::http::PageSource;

/// Fetches and extracts one group at a time.
pub struct GroupScraper {
    portal: PortalConfig,
    source: Arc<dyn PageSource>,
    extractor: GroupExtractor,
}

impl GroupScraper {
    pub fn new(portal: PortalConfig, source: Arc<dyn PageSource>) -> Result<Self> {
        Ok(Self {
            portal,
            source,
            extractor: GroupExtractor::new()?,
        })
    }

    /// Fetch the group's page and extract it.
    ///
    /// `Ok(None)` means the page loaded but does not show the group.
    pub async fn fetch_group(&self, group_id: &str) -> Result<Option<GroupRecord>> {
        let url = self.portal.group_url(group_id)?;
        let html = self.source.fetch_text(&url).await?;
        Ok(self.extractor.extract(&html, group_id))
    }
}
