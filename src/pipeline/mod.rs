//! Pipeline entry points for crawler operations.
//!
//! - `GroupsPipeline::refresh`: serve cached groups or crawl the portal
//! - `GroupsPipeline::group`: scrape a single group
//! - `GroupsPipeline::discover`: list group numbers

pub mod refresh;

pub use refresh::{GroupsPipeline, RefreshOutcome};
