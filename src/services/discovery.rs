// src/services/discovery.rs

//! Group discovery service.
//!
//! Collects candidate group numbers from the portal's timetable index pages.

use std::collections::BTreeSet;
use std::sync::Arc;

use regex::Regex;
use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::PortalConfig;
use crate::utils::http::PageSource;

/// Leading digits of plausible group numbers.
const VALID_LEADING_DIGITS: [char; 5] = ['2', '3', '4', '5', '6'];

/// Service for discovering group numbers across portal categories.
pub struct GroupDiscovery {
    portal: PortalConfig,
    source: Arc<dyn PageSource>,
    link_selector: Selector,
    group_re: Regex,
}

impl GroupDiscovery {
    pub fn new(portal: PortalConfig, source: Arc<dyn PageSource>) -> Result<Self> {
        let link_selector = Selector::parse("table.viewtable a")
            .map_err(|e| AppError::selector("table.viewtable a", format!("{e:?}")))?;
        Ok(Self {
            portal,
            source,
            link_selector,
            group_re: Regex::new(r"\d{4}")?,
        })
    }

    /// Collect group numbers from every category.
    ///
    /// A category that fails to load is logged and contributes nothing.
    pub async fn collect_group_numbers(&self) -> BTreeSet<String> {
        let mut numbers = BTreeSet::new();

        for category in &self.portal.categories {
            match self.collect_category(category).await {
                Ok(found) => {
                    log::info!("Category {}: {} groups", category, found.len());
                    numbers.extend(found);
                }
                Err(e) => {
                    log::error!("Failed to collect groups for category {}: {}", category, e);
                }
            }
        }

        numbers
    }

    async fn collect_category(&self, category: &str) -> Result<BTreeSet<String>> {
        let url = self.portal.category_url(category)?;
        let html = self.source.fetch_text(&url).await?;
        Ok(self.parse_index(&html))
    }

    /// Extract group numbers from one category index page.
    pub fn parse_index(&self, html: &str) -> BTreeSet<String> {
        let document = Html::parse_document(html);

        document
            .select(&self.link_selector)
            .flat_map(|link| {
                let text: String = link.text().collect();
                self.group_re
                    .find_iter(text.trim())
                    .map(|m| m.as_str().to_string())
                    .collect::<Vec<_>>()
            })
            .filter(|number| is_plausible_group(number))
            .collect()
    }
}

/// Whether a 4-digit number looks like a real group.
pub fn is_plausible_group(number: &str) -> bool {
    number
        .chars()
        .next()
        .is_some_and(|c| VALID_LEADING_DIGITS.contains(&c))
}
