//! Service layer for the crawler application.
//!
//! This module contains the business logic for:
//! - Group page extraction (`GroupExtractor`)
//! - Group number discovery (`GroupDiscovery`)
//! - Single-group scraping (`GroupScraper`)
//! - Throttled batch processing (`BatchOrchestrator`)

mod batch;
mod discovery;
mod extractor;
mod groups;

pub use batch::{BatchOrchestrator, BatchOutcome, finalize, select_ids};
pub use discovery::{GroupDiscovery, is_plausible_group};
pub use extractor::{GroupExtractor, course_from_group_id};
pub use groups::GroupScraper;
