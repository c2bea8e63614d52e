//! End-to-end pipeline tests against an in-memory portal.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tempfile::TempDir;

use roster_crawler::error::{AppError, Result};
use roster_crawler::models::{CacheEntry, Config};
use roster_crawler::pipeline::{GroupsPipeline, RefreshOutcome};
use roster_crawler::storage::{CacheStore, LocalCache};
use roster_crawler::utils::http::PageSource;

/// Serves fixed pages; unknown URLs get an empty page. Counts every fetch.
struct FakePortal {
    pages: HashMap<String, String>,
    offline: bool,
    fetches: AtomicUsize,
}

impl FakePortal {
    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageSource for FakePortal {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.offline {
            return Err(AppError::Status {
                url: url.to_string(),
                status: 503,
            });
        }
        Ok(self
            .pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| "<html><body></body></html>".to_string()))
    }
}

const GROUP_PAGE: &str = r#"
<html><body>
  <h3>Группа: 3991</h3>
  <div id="npe_instance_2500_npe_content">
    <ul>
      <li>Год поступления: 2023</li>
      <li>Курс: 3</li>
      <li>Институт: ИЭИС</li>
      <li>Направление: 09.03.01 Информатика и вычислительная техника</li>
      <li>Форма обучения: очная</li>
    </ul>
    <table>
      <tr><th>№ п/п</th><th>ФИО</th><th>Статус</th></tr>
      <tr><td>1</td><td><a href="/person/501">Смирнова Анна Сергеевна</a></td><td>СТ</td></tr>
      <tr><td>2</td><td><a href="/person/502">Кузнецов Олег Петрович</a></td><td>АО</td></tr>
    </table>
  </div>
</body></html>
"#;

fn test_config(tmp: &TempDir) -> Config {
    let mut config = Config::default();
    config.crawler.request_delay_ms = 0;
    config.crawler.batch_pause_ms = 0;
    config.crawler.retry_backoff_ms = 0;
    config.crawler.retry_attempts = 1;
    config.cache.path = tmp.path().join("cache/groups.json");
    config
}

fn portal(config: &Config, offline: bool) -> Arc<FakePortal> {
    let mut pages = HashMap::new();
    pages.insert(
        config.portal.category_url("ochn").unwrap(),
        r#"<table class="viewtable">
             <tr><td><a>3991</a></td><td><a>4992, 1234</a></td></tr>
             <tr><td><a>ИВТ</a></td></tr>
           </table>"#
            .to_string(),
    );
    pages.insert(config.portal.group_url("3991").unwrap(), GROUP_PAGE.to_string());

    Arc::new(FakePortal {
        pages,
        offline,
        fetches: AtomicUsize::new(0),
    })
}

fn pipeline(config: &Config, source: Arc<FakePortal>) -> (GroupsPipeline, Arc<LocalCache>) {
    let store = Arc::new(LocalCache::from_config(&config.cache));
    let pipeline = GroupsPipeline::new(
        config,
        source as Arc<dyn PageSource>,
        Arc::clone(&store) as Arc<dyn CacheStore>,
    )
    .unwrap();
    (pipeline, store)
}

#[tokio::test]
async fn crawl_then_serve_from_cache() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let source = portal(&config, false);
    let (pipeline, _) = pipeline(&config, Arc::clone(&source));

    let first = pipeline.refresh().await.unwrap();
    let RefreshOutcome::Fresh {
        entry, statistics, ..
    } = &first
    else {
        panic!("expected a fresh crawl, got {first:?}");
    };

    // 1234 starts with 1 and is never requested.
    assert_eq!(entry.total_groups, 2);
    assert_eq!(entry.processed_groups, 1);
    assert_eq!(entry.groups.len(), 1);

    let group = &entry.groups[0];
    assert_eq!(group.number, 3991);
    assert_eq!(group.course, 3);
    assert_eq!(group.year_receipt, 2023);
    assert_eq!(group.institution, "ИЭИС");
    assert_eq!(group.count_student, 2);
    assert_eq!(group.students[1].person_id, "502");
    assert_eq!(statistics.by_course.get(&3), Some(&1));

    // Three index pages plus two group pages.
    let after_crawl = source.fetches();
    assert_eq!(after_crawl, 5);

    let second = pipeline.refresh().await.unwrap();
    assert!(matches!(second, RefreshOutcome::Cached(_)));
    assert_eq!(second.entry(), first.entry());
    assert_eq!(source.fetches(), after_crawl);
}

#[tokio::test]
async fn cache_survives_restart() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);

    let (pipeline_a, _) = pipeline(&config, portal(&config, false));
    let crawled = pipeline_a.refresh().await.unwrap();

    let offline = portal(&config, true);
    let (pipeline_b, _) = pipeline(&config, Arc::clone(&offline));
    let served = pipeline_b.refresh().await.unwrap();

    assert!(matches!(served, RefreshOutcome::Cached(_)));
    assert_eq!(served.entry(), crawled.entry());
    assert_eq!(offline.fetches(), 0);
}

#[tokio::test]
async fn expired_cache_is_served_when_portal_is_down() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let (pipeline, store) = pipeline(&config, portal(&config, true));

    let old = CacheEntry::with_timestamp(Vec::new(), 7, 1_000);
    store.persist(&old).await.unwrap();

    match pipeline.refresh().await.unwrap() {
        RefreshOutcome::Stale { entry, error } => {
            assert_eq!(entry, old);
            assert!(error.contains("No groups"));
        }
        other => panic!("expected stale fallback, got {other:?}"),
    }
}

#[tokio::test]
async fn failure_without_cache_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let (pipeline, store) = pipeline(&config, portal(&config, true));

    let err = pipeline.refresh().await.unwrap_err();
    assert!(matches!(err, AppError::Discovery(_)));
    assert!(store.load_stale().await.is_none());
}

#[tokio::test]
async fn forced_crawl_replaces_valid_cache() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let source = portal(&config, false);
    let (pipeline, store) = pipeline(&config, Arc::clone(&source));

    store
        .save(&CacheEntry::new(Vec::new(), 0))
        .await;

    let outcome = pipeline.crawl_or_stale().await.unwrap();
    assert!(!outcome.is_cached());
    assert_eq!(outcome.entry().groups.len(), 1);
    assert_eq!(store.load().await.unwrap().groups.len(), 1);
}

#[tokio::test]
async fn invalidate_forces_recrawl() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let source = portal(&config, false);
    let (pipeline, _) = pipeline(&config, Arc::clone(&source));

    pipeline.refresh().await.unwrap();
    pipeline.invalidate().await;
    assert!(!config.cache.path.exists());

    let again = pipeline.refresh().await.unwrap();
    assert!(!again.is_cached());
    assert_eq!(source.fetches(), 10);
}

#[tokio::test]
async fn single_group_and_discovery() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let (pipeline, store) = pipeline(&config, portal(&config, false));

    let record = pipeline.group("3991").await.unwrap().unwrap();
    assert_eq!(record.students.len(), 2);
    assert!(pipeline.group("4992").await.unwrap().is_none());

    assert_eq!(pipeline.discover().await.unwrap(), vec![3991, 4992]);

    // Neither operation touches the cache.
    assert!(store.load_stale().await.is_none());
}
