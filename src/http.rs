//! HTML fetching with a browser identity and retry on server errors.
//!
//! [`FetchHtml`] is the seam the scrapers fetch through. [`HttpClient`] is
//! the real implementation on top of `reqwest`, and [`RetryFetch`] wraps any
//! fetcher with exponential backoff that only fires on 5xx responses.
//!
//! Client errors (4xx) and transport failures (DNS, refused connection,
//! timeout) are returned to the caller immediately.

use rand::{Rng, rng};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// Per-attempt timeout. Each retry gets a fresh clock.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub const MAX_RETRIES: usize = 3;

pub const BASE_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("server error {status} from {url}")]
    Server { status: StatusCode, url: String },

    #[error("unexpected status {status} from {url}")]
    Status { status: StatusCode, url: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl FetchError {
    /// Only 5xx responses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Server { .. })
    }
}

/// Something that can turn a URL into an HTML document body.
pub trait FetchHtml {
    async fn fetch_html(&self, url: &str) -> Result<String, FetchError>;
}

impl<T: FetchHtml> FetchHtml for &T {
    async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        (**self).fetch_html(url).await
    }
}

/// `reqwest` client configured with the browser identity and timeout.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));

        let inner = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { inner })
    }
}

impl FetchHtml for HttpClient {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        let response = self.inner.get(url).send().await?;
        let status = response.status();

        if status.is_server_error() {
            return Err(FetchError::Server {
                status,
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        debug!(bytes = body.len(), "Fetched page");
        Ok(body)
    }
}

/// Wrapper that retries server errors with exponential backoff.
///
/// ```text
/// delay = base_delay * 2^attempt + random_jitter(0..=20%)
/// ```
pub struct RetryFetch<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
}

impl<T: FetchHtml> RetryFetch<T> {
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
        }
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let delay = self.base_delay.saturating_mul(1 << attempt.min(16));
        let jitter_ms = rng().random_range(0..=delay.as_millis() as u64 / 5);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .finish()
    }
}

impl<T: FetchHtml> FetchHtml for RetryFetch<T> {
    async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch_html(url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        ?delay,
                        error = %e,
                        %url,
                        "Retrying request"
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays a fixed sequence of outcomes, one per call.
    struct ScriptedFetch {
        script: Mutex<VecDeque<Result<String, StatusCode>>>,
        calls: AtomicUsize,
    }

    impl ScriptedFetch {
        fn new(script: Vec<Result<String, StatusCode>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl FetchHtml for ScriptedFetch {
        async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(body)) => Ok(body),
                Some(Err(status)) if status.is_server_error() => Err(FetchError::Server {
                    status,
                    url: url.to_string(),
                }),
                Some(Err(status)) => Err(FetchError::Status {
                    status,
                    url: url.to_string(),
                }),
                None => panic!("script exhausted for {url}"),
            }
        }
    }

    fn retrying(script: Vec<Result<String, StatusCode>>) -> RetryFetch<ScriptedFetch> {
        RetryFetch::new(ScriptedFetch::new(script), MAX_RETRIES, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_server_error_then_success_is_transparent() {
        let fetcher = retrying(vec![
            Err(StatusCode::SERVICE_UNAVAILABLE),
            Ok("<html></html>".to_string()),
        ]);
        let body = fetcher.fetch_html("https://example.com").await.unwrap();
        assert_eq!(body, "<html></html>");
        assert_eq!(fetcher.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let fetcher = retrying(vec![Err(StatusCode::NOT_FOUND)]);
        let err = fetcher.fetch_html("https://example.com").await.unwrap_err();
        assert!(matches!(err, FetchError::Status { .. }));
        assert_eq!(fetcher.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_three_retries() {
        let fetcher = retrying(vec![
            Err(StatusCode::BAD_GATEWAY),
            Err(StatusCode::BAD_GATEWAY),
            Err(StatusCode::BAD_GATEWAY),
            Err(StatusCode::BAD_GATEWAY),
        ]);
        let err = fetcher.fetch_html("https://example.com").await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(fetcher.inner.calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_backoff_grows_exponentially() {
        let fetcher = RetryFetch::new(ScriptedFetch::new(vec![]), 3, Duration::from_millis(100));
        let first = fetcher.backoff(1);
        let third = fetcher.backoff(3);
        assert!(first >= Duration::from_millis(200) && first <= Duration::from_millis(240));
        assert!(third >= Duration::from_millis(800) && third <= Duration::from_millis(960));
    }

    #[test]
    fn test_only_server_errors_are_retryable() {
        let server = FetchError::Server {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            url: "u".to_string(),
        };
        let client = FetchError::Status {
            status: StatusCode::FORBIDDEN,
            url: "u".to_string(),
        };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
    }
}
