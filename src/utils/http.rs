// src/utils/http.rs

//! HTTP client utilities.
//!
//! Every request is raced against a per-attempt deadline and retried with a
//! linear backoff. A 404 is final and never retried.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Anything that can hand back the body of a portal page.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the page at `url` and return its body text.
    async fn fetch_text(&self, url: &str) -> Result<String>;
}

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &CrawlerConfig) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_str(&config.accept_language)
            .map_err(|e| AppError::config(format!("Invalid accept_language: {e}")))?,
    );

    let client = Client::builder()
        .user_agent(&config.user_agent)
        .default_headers(headers)
        .build()?;
    Ok(client)
}

/// Portal fetcher backed by reqwest.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
    attempts: u32,
    backoff: Duration,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            timeout: config.timeout(),
            attempts: config.retry_attempts.max(1),
            backoff: config.retry_backoff(),
        })
    }

    /// One GET bounded by the configured timeout.
    ///
    /// Dropping the request future on expiry aborts the connection.
    pub async fn fetch_with_timeout(&self, url: &str) -> Result<Response> {
        match tokio::time::timeout(self.timeout, self.client.get(url).send()).await {
            Ok(response) => Ok(response?),
            Err(_) => Err(AppError::Timeout {
                url: url.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }

    /// GET with status classification and retry.
    pub async fn fetch_with_retry(&self, url: &str) -> Result<Response> {
        retry_with_backoff(url, self.attempts, self.backoff, || async {
            let response = self.fetch_with_timeout(url).await?;
            check_status(url, response.status())?;
            Ok(response)
        })
        .await
    }
}

#[async_trait]
impl PageSource for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.fetch_with_retry(url).await?;
        Ok(response.text().await?)
    }
}

/// Map an HTTP status onto the error taxonomy.
pub fn check_status(url: &str, status: StatusCode) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::NOT_FOUND {
        return Err(AppError::NotFound {
            url: url.to_string(),
        });
    }
    Err(AppError::Status {
        url: url.to_string(),
        status: status.as_u16(),
    })
}

/// Run `op` up to `attempts` times.
///
/// Waits `backoff * (attempt + 1)` after each transient failure except the
/// last. Permanent errors are returned as-is without consuming the remaining
/// attempts.
pub async fn retry_with_backoff<T, F, Fut>(
    url: &str,
    attempts: u32,
    backoff: Duration,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut last = String::new();

    for attempt in 0..attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_permanent() => return Err(e),
            Err(e) => {
                log::debug!("Attempt {}/{} for {} failed: {}", attempt + 1, attempts, url, e);
                last = e.to_string();
                if attempt + 1 < attempts && !backoff.is_zero() {
                    tokio::time::sleep(backoff * (attempt + 1)).await;
                }
            }
        }
    }

    Err(AppError::RetriesExhausted {
        url: url.to_string(),
        attempts,
        last,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    use tokio::net::TcpListener;

    use super::*;

    #[test]
    fn check_status_classifies() {
        assert!(check_status("u", StatusCode::OK).is_ok());
        assert!(matches!(
            check_status("u", StatusCode::NOT_FOUND),
            Err(AppError::NotFound { .. })
        ));
        assert!(matches!(
            check_status("u", StatusCode::BAD_GATEWAY),
            Err(AppError::Status { status: 502, .. })
        ));
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff("u", 3, Duration::ZERO, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(AppError::NotFound {
                    url: "u".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(AppError::NotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_failures_use_every_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff("https://x/y", 2, Duration::ZERO, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(AppError::Status {
                    url: "https://x/y".to_string(),
                    status: 503,
                })
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        match result {
            Err(AppError::RetriesExhausted { url, attempts, .. }) => {
                assert_eq!(url, "https://x/y");
                assert_eq!(attempts, 2);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn recovers_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff("u", 2, Duration::from_millis(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(AppError::Timeout {
                        url: "u".to_string(),
                        timeout_ms: 1,
                    })
                } else {
                    Ok("body")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "body");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn client_rejects_invalid_accept_language() {
        let config = CrawlerConfig {
            accept_language: "ru\nru".to_string(),
            ..CrawlerConfig::default()
        };
        assert!(create_async_client(&config).is_err());
    }

    #[tokio::test]
    async fn silent_server_times_out_every_attempt() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept connections and never answer.
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let config = CrawlerConfig {
            timeout_ms: 100,
            retry_attempts: 2,
            retry_backoff_ms: 10,
            ..CrawlerConfig::default()
        };
        let fetcher = HttpFetcher::new(&config).unwrap();
        let url = format!("http://{addr}/univer/timetable/spo/");

        let start = Instant::now();
        let err = fetcher.fetch_text(&url).await.unwrap_err();
        let elapsed = start.elapsed();

        match err {
            AppError::RetriesExhausted { attempts, last, .. } => {
                assert_eq!(attempts, 2);
                assert!(last.contains("timed out after 100ms"), "{last}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_secs(2));
    }
}
