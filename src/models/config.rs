//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Portal locations
    #[serde(default)]
    pub portal: PortalConfig,

    /// Result cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// HTTP API settings
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Override selected values from the environment.
    pub fn apply_env_overrides(&mut self) {
        if let Some(ms) = env_parse("ROSTER_TIMEOUT_MS") {
            self.crawler.timeout_ms = ms;
        }
        if let Some(n) = env_parse("ROSTER_MAX_GROUPS") {
            self.crawler.max_groups_per_run = n;
        }
        if let Some(n) = env_parse("ROSTER_BATCH_SIZE") {
            self.crawler.batch_size = n;
        }
        if let Some(ms) = env_parse("ROSTER_REQUEST_DELAY_MS") {
            self.crawler.request_delay_ms = ms;
        }
        if let Ok(path) = std::env::var("ROSTER_CACHE_PATH") {
            self.cache.path = PathBuf::from(path);
        }
        if let Ok(bind) = std::env::var("ROSTER_BIND") {
            self.server.bind = bind;
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_ms == 0 {
            return Err(AppError::validation("crawler.timeout_ms must be > 0"));
        }
        if self.crawler.retry_attempts == 0 {
            return Err(AppError::validation("crawler.retry_attempts must be > 0"));
        }
        if self.crawler.batch_size == 0 {
            return Err(AppError::validation("crawler.batch_size must be > 0"));
        }
        if self.crawler.max_groups_per_run == 0 {
            return Err(AppError::validation(
                "crawler.max_groups_per_run must be > 0",
            ));
        }
        if self.portal.categories.is_empty() {
            return Err(AppError::validation("No portal categories defined"));
        }
        url::Url::parse(&self.portal.base_url)?;
        if self.cache.ttl_secs == 0 {
            return Err(AppError::validation("cache.ttl_secs must be > 0"));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Accept-Language header; the portal varies markup by it
    #[serde(default = "defaults::accept_language")]
    pub accept_language: String,

    /// Per-attempt timeout in milliseconds
    #[serde(default = "defaults::timeout")]
    pub timeout_ms: u64,

    /// Total tries per URL
    #[serde(default = "defaults::retry_attempts")]
    pub retry_attempts: u32,

    /// Base of the linear backoff between tries
    #[serde(default = "defaults::retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Delay before each group request in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Groups fetched concurrently in one batch
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,

    /// Pause between batches in milliseconds
    #[serde(default = "defaults::batch_pause")]
    pub batch_pause_ms: u64,

    /// Upper bound on groups processed by one run
    #[serde(default = "defaults::max_groups_per_run")]
    pub max_groups_per_run: usize,
}

impl CrawlerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            accept_language: defaults::accept_language(),
            timeout_ms: defaults::timeout(),
            retry_attempts: defaults::retry_attempts(),
            retry_backoff_ms: defaults::retry_backoff(),
            request_delay_ms: defaults::request_delay(),
            batch_size: defaults::batch_size(),
            batch_pause_ms: defaults::batch_pause(),
            max_groups_per_run: defaults::max_groups_per_run(),
        }
    }
}

/// Where the portal pages live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Portal origin, e.g. `https://portal.novsu.ru`
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Timetable sections enumerating groups
    #[serde(default = "defaults::categories")]
    pub categories: Vec<String>,

    /// Path of the group search page
    #[serde(default = "defaults::search_path")]
    pub search_path: String,
}

impl PortalConfig {
    /// Index page listing every group of a category.
    pub fn category_url(&self, category: &str) -> Result<String> {
        let base = url::Url::parse(&self.base_url)?;
        Ok(base
            .join(&format!("/univer/timetable/{category}/"))?
            .to_string())
    }

    /// Search page showing a single group and its roster.
    pub fn group_url(&self, group_id: &str) -> Result<String> {
        let base = url::Url::parse(&self.base_url)?.join(&self.search_path)?;
        let url = url::Url::parse_with_params(
            base.as_str(),
            &[("page", "search"), ("grpname", group_id)],
        )?;
        Ok(url.to_string())
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            categories: defaults::categories(),
            search_path: defaults::search_path(),
        }
    }
}

/// Result cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Location of the persisted cache file
    #[serde(default = "defaults::cache_path")]
    pub path: PathBuf,

    /// Validity window in seconds
    #[serde(default = "defaults::cache_ttl")]
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: defaults::cache_path(),
            ttl_secs: defaults::cache_ttl(),
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind (host:port)
    #[serde(default = "defaults::bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: defaults::bind(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".into()
    }
    pub fn accept_language() -> String {
        "ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7".into()
    }
    pub fn timeout() -> u64 {
        10_000
    }
    pub fn retry_attempts() -> u32 {
        2
    }
    pub fn retry_backoff() -> u64 {
        1_000
    }
    pub fn request_delay() -> u64 {
        200
    }
    pub fn batch_size() -> usize {
        5
    }
    pub fn batch_pause() -> u64 {
        1_000
    }
    pub fn max_groups_per_run() -> usize {
        50
    }

    // Portal defaults
    pub fn base_url() -> String {
        "https://portal.novsu.ru".into()
    }
    pub fn categories() -> Vec<String> {
        vec!["spo".into(), "ochn".into(), "zaochn".into()]
    }
    pub fn search_path() -> String {
        "/search/groups/i.2500/".into()
    }

    // Cache defaults
    pub fn cache_path() -> PathBuf {
        PathBuf::from(".cache/groups.json")
    }
    pub fn cache_ttl() -> u64 {
        24 * 60 * 60
    }

    // Server defaults
    pub fn bind() -> String {
        "127.0.0.1:8080".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.crawler.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_batch_size() {
        let mut config = Config::default();
        config.crawler.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_base_url() {
        let mut config = Config::default();
        config.portal.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [crawler]
            batch_size = 3

            [cache]
            path = "/tmp/groups.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.crawler.batch_size, 3);
        assert_eq!(config.crawler.max_groups_per_run, 50);
        assert_eq!(config.crawler.retry_attempts, 2);
        assert_eq!(config.cache.ttl_secs, 86_400);
        assert_eq!(config.portal.categories, vec!["spo", "ochn", "zaochn"]);
    }

    #[test]
    fn category_url_has_trailing_slash() {
        let portal = PortalConfig::default();
        assert_eq!(
            portal.category_url("ochn").unwrap(),
            "https://portal.novsu.ru/univer/timetable/ochn/"
        );
    }

    #[test]
    fn group_url_carries_search_params() {
        let portal = PortalConfig::default();
        assert_eq!(
            portal.group_url("5101").unwrap(),
            "https://portal.novsu.ru/search/groups/i.2500/?page=search&grpname=5101"
        );
    }
}
