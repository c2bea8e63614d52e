// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod cache;
mod config;
mod group;

// Re-export all public types
pub use cache::{CacheEntry, GroupStatistics, iso_millis};
pub use config::{CacheConfig, Config, CrawlerConfig, PortalConfig, ServerConfig};
pub use group::{DEFAULT_FORM_TRAINING, DEFAULT_INSTITUTION, GroupRecord, Student};
