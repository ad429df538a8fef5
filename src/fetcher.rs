//! Cache-aware HTTP content fetching with bounded exponential backoff.
//!
//! [`ContentFetcher::fetch`] consults the [`CacheStore`] before any network I/O.
//! On a miss it issues a GET through a retry decorator and writes a successful
//! body back to the cache.
//!
//! # Retry Strategy
//!
//! - At most [`RetryPolicy::max_attempts`] attempts in total
//! - Exponential backoff starting at `base_delay`, doubling each attempt
//! - Delay capped at `max_delay`, plus random jitter up to `jitter`
//! - 4xx responses are permanent and never retried
//! - 5xx responses, timeouts, and transport errors are retried
//!
//! The delay between attempts follows:
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..=jitter)
//! ```

use rand::{Rng, rng};
use reqwest::header::USER_AGENT;
use reqwest::{Client, StatusCode};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::cache::{CacheStore, cache_key};
use crate::error::FetchError;

/// Backoff settings for failed attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 are treated as 1.
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the random delay added to each backoff.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the next attempt, excluding jitter. `attempt` is 1-based.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(31) as u32;
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }

    fn delay(&self, attempt: usize) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rng().random_range(0..=jitter_ms))
        };
        self.backoff(attempt) + jitter
    }
}

/// Per-call fetch options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub timeout: Duration,
    pub user_agent: String,
    /// When false, the cache is neither read nor written.
    pub use_cache: bool,
    /// Extra key material (version, variant, ...). Not sent to the server.
    pub params: BTreeMap<String, String>,
    /// Overrides the store's default TTL for the written entry.
    pub ttl: Option<Duration>,
}

impl FetchRequest {
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Self {
        Self {
            timeout,
            user_agent: user_agent.into(),
            use_cache: true,
            params: BTreeMap::new(),
            ttl: None,
        }
    }

    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Result of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub html: String,
    pub from_cache: bool,
    /// HTTP attempts made; 0 on a cache hit.
    pub attempts: usize,
}

/// Why a single attempt failed.
#[derive(Debug)]
pub(crate) enum AttemptError {
    Status(StatusCode),
    Transport(reqwest::Error),
}

impl AttemptError {
    /// Client errors cannot succeed on repeat.
    fn is_permanent(&self) -> bool {
        matches!(self, Self::Status(status) if status.is_client_error())
    }

    fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status(status) => Some(*status),
            Self::Transport(e) => e.status(),
        }
    }
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "HTTP {status}"),
            Self::Transport(e) if e.is_timeout() => write!(f, "timed out: {e}"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
        }
    }
}

/// One HTTP GET attempt, no retries.
pub(crate) trait Transport {
    async fn get(&self, url: &Url, request: &FetchRequest) -> Result<String, AttemptError>;
}

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub(crate) struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(FetchError::Build)?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn get(&self, url: &Url, request: &FetchRequest) -> Result<String, AttemptError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(request.timeout)
            .header(USER_AGENT, request.user_agent.as_str())
            .send()
            .await
            .map_err(AttemptError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status));
        }
        response.text().await.map_err(AttemptError::Transport)
    }
}

/// Adds bounded exponential backoff to any [`Transport`].
pub(crate) struct Retrying<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T> fmt::Debug for Retrying<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retrying")
            .field("policy", &self.policy)
            .finish()
    }
}

impl<T> Retrying<T>
where
    T: Transport,
{
    pub(crate) fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Run attempts until success, a permanent error, or the attempt budget is spent.
    /// Returns the body and the number of attempts made.
    pub(crate) async fn get(
        &self,
        url: &Url,
        request: &FetchRequest,
    ) -> Result<(String, usize), FetchError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let attempt_t0 = Instant::now();
            let e = match self.inner.get(url, request).await {
                Ok(body) => return Ok((body, attempt)),
                Err(e) => e,
            };
            let elapsed_ms_attempt = attempt_t0.elapsed().as_millis();
            let elapsed_ms_total = total_t0.elapsed().as_millis();

            if e.is_permanent() {
                warn!(%url, attempt, error = %e, "permanent client error; not retrying");
                return Err(FetchError::Client {
                    url: url.to_string(),
                    status: e.status().unwrap_or(StatusCode::BAD_REQUEST),
                });
            }

            if attempt >= max_attempts {
                error!(
                    %url,
                    attempt,
                    max = max_attempts,
                    elapsed_ms_attempt,
                    elapsed_ms_total,
                    error = %e,
                    "fetch exhausted retries"
                );
                return Err(FetchError::Exhausted {
                    url: url.to_string(),
                    attempts: attempt,
                    status: e.status(),
                    last: e.to_string(),
                });
            }

            let delay = self.policy.delay(attempt);
            warn!(
                %url,
                attempt,
                max = max_attempts,
                elapsed_ms_attempt,
                elapsed_ms_total,
                ?delay,
                error = %e,
                "fetch attempt failed; backing off"
            );
            sleep(delay).await;
        }
    }
}

/// Retrieves raw HTML, consulting the cache first.
#[derive(Debug)]
pub struct ContentFetcher {
    transport: Retrying<HttpTransport>,
    cache: Arc<CacheStore>,
}

impl ContentFetcher {
    /// Build a fetcher with its own HTTP client.
    ///
    /// # Arguments
    ///
    /// * `cache` - Store consulted before and written after every fetch
    /// * `policy` - Retry and backoff settings for cache misses
    ///
    /// # Returns
    ///
    /// The fetcher, or [`FetchError::Build`] if the HTTP client cannot be created.
    pub fn new(cache: Arc<CacheStore>, policy: RetryPolicy) -> Result<Self, FetchError> {
        Ok(Self {
            transport: Retrying::new(HttpTransport::new()?, policy),
            cache,
        })
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.transport.policy
    }

    /// Fetch `url` with the given timeout and user agent, using the cache.
    pub async fn fetch(
        &self,
        url: &str,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<FetchOutcome, FetchError> {
        self.fetch_with(url, &FetchRequest::new(timeout, user_agent))
            .await
    }

    /// Fetch `url` with full per-call options.
    ///
    /// # Errors
    ///
    /// - [`FetchError::InvalidUrl`] / [`FetchError::UnsupportedScheme`] before any I/O
    /// - [`FetchError::Client`] on a 4xx response (one attempt)
    /// - [`FetchError::Exhausted`] when every attempt failed
    /// - [`FetchError::Cache`] only if the cache store is fail-hard
    #[instrument(level = "info", skip_all, fields(%url))]
    pub async fn fetch_with(
        &self,
        url: &str,
        request: &FetchRequest,
    ) -> Result<FetchOutcome, FetchError> {
        let parsed = parse_http_url(url)?;
        let key = cache_key(&parsed, &request.params);

        if request.use_cache {
            if let Some(html) = self.cache.get(&key).await? {
                info!(bytes = html.len(), "using cached content");
                return Ok(FetchOutcome {
                    html,
                    from_cache: true,
                    attempts: 0,
                });
            }
        }

        let t0 = Instant::now();
        debug!(timeout_ms = request.timeout.as_millis(), "fetching fresh content");
        let (html, attempts) = self.transport.get(&parsed, request).await?;
        info!(
            bytes = html.len(),
            attempts,
            elapsed_ms = t0.elapsed().as_millis(),
            "fetched content"
        );

        if request.use_cache {
            self.cache.set(&key, &html, request.ttl).await;
        }

        Ok(FetchOutcome {
            html,
            from_cache: false,
            attempts,
        })
    }
}

/// Parse and require an http(s) URL.
pub fn parse_http_url(url: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(FetchError::UnsupportedScheme {
            url: url.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheBackend, CacheStats};
    use crate::error::CacheError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path},
    };

    fn fast_policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: Duration::ZERO,
        }
    }

    fn fetcher(max_attempts: usize) -> ContentFetcher {
        let cache = Arc::new(CacheStore::in_memory(Duration::from_secs(60)));
        ContentFetcher::new(cache, fast_policy(max_attempts)).unwrap()
    }

    fn request() -> FetchRequest {
        FetchRequest::new(Duration::from_secs(5), "trend_scraper-test/1.0")
    }

    /// Replays scripted statuses, then succeeds.
    struct ScriptedTransport {
        script: Mutex<VecDeque<StatusCode>>,
        calls: Mutex<usize>,
    }

    impl ScriptedTransport {
        fn new(statuses: &[StatusCode]) -> Self {
            Self {
                script: Mutex::new(statuses.iter().copied().collect()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl Transport for &ScriptedTransport {
        async fn get(&self, _url: &Url, _request: &FetchRequest) -> Result<String, AttemptError> {
            *self.calls.lock().unwrap() += 1;
            match self.script.lock().unwrap().pop_front() {
                Some(status) => Err(AttemptError::Status(status)),
                None => Ok("<html>ok</html>".to_string()),
            }
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            jitter: Duration::ZERO,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(4), Duration::from_millis(800));
        assert_eq!(policy.backoff(5), Duration::from_millis(1000));
        assert_eq!(policy.backoff(64), Duration::from_millis(1000));
    }

    #[test]
    fn test_parse_http_url() {
        assert!(parse_http_url("https://example.com/a").is_ok());
        assert!(matches!(
            parse_http_url("not a url"),
            Err(FetchError::InvalidUrl { .. })
        ));
        assert!(matches!(
            parse_http_url("ftp://example.com/file"),
            Err(FetchError::UnsupportedScheme { .. })
        ));
    }

    #[tokio::test]
    async fn test_retrying_recovers_after_server_errors() {
        let transport = ScriptedTransport::new(&[
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::SERVICE_UNAVAILABLE,
        ]);
        let retrying = Retrying::new(&transport, fast_policy(3));
        let url = Url::parse("https://example.com/").unwrap();

        let (body, attempts) = retrying.get(&url, &request()).await.unwrap();
        assert_eq!(body, "<html>ok</html>");
        assert_eq!(attempts, 3);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_retrying_stops_on_client_error() {
        let transport = ScriptedTransport::new(&[StatusCode::NOT_FOUND]);
        let retrying = Retrying::new(&transport, fast_policy(5));
        let url = Url::parse("https://example.com/").unwrap();

        let err = retrying.get(&url, &request()).await.unwrap_err();
        assert!(matches!(err, FetchError::Client { status, .. } if status == StatusCode::NOT_FOUND));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_retrying_zero_attempts_still_tries_once() {
        let transport = ScriptedTransport::new(&[StatusCode::BAD_GATEWAY]);
        let retrying = Retrying::new(&transport, fast_policy(0));
        let url = Url::parse("https://example.com/").unwrap();

        let err = retrying.get(&url, &request()).await.unwrap_err();
        assert_eq!(err.attempts(), 1);
        assert_eq!(err.status(), Some(StatusCode::BAD_GATEWAY));
    }

    #[tokio::test]
    async fn test_fetch_caches_within_ttl() -> Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/trending"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<ul><li>one</li></ul>"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = fetcher(3);
        let url = format!("{}/trending", mock_server.uri());

        let first = fetcher.fetch_with(&url, &request()).await?;
        assert!(!first.from_cache);
        assert_eq!(first.attempts, 1);

        for _ in 0..3 {
            let again = fetcher.fetch_with(&url, &request()).await?;
            assert!(again.from_cache);
            assert_eq!(again.html, first.html);
            assert_eq!(again.attempts, 0);
        }

        let stats = fetcher.cache().stats().await;
        assert_eq!(
            stats,
            CacheStats {
                hit_count: 3,
                miss_count: 1,
                entry_count: 1,
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_refetches_after_ttl_expires() -> Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/expiring"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>fresh</p>"))
            .expect(2)
            .mount(&mock_server)
            .await;

        let fetcher = fetcher(1);
        let url = format!("{}/expiring", mock_server.uri());
        let short = request().ttl(Duration::from_millis(300));

        assert!(!fetcher.fetch_with(&url, &short).await?.from_cache);
        assert!(fetcher.fetch_with(&url, &short).await?.from_cache);

        sleep(Duration::from_millis(600)).await;
        let refreshed = fetcher.fetch_with(&url, &short).await?;
        assert!(!refreshed.from_cache);
        assert_eq!(refreshed.attempts, 1);
        assert_eq!(refreshed.html, "<p>fresh</p>");

        // the re-fetch wrote a new entry
        assert!(fetcher.fetch_with(&url, &short).await?.from_cache);
        assert_eq!(fetcher.cache().stats().await.entry_count, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_equivalent_query_order_hits_cache() -> Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("results"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = fetcher(1);
        let first = format!("{}/search?b=2&a=1", mock_server.uri());
        let second = format!("{}/search?a=1&b=2#frag", mock_server.uri());

        assert!(!fetcher.fetch_with(&first, &request()).await?.from_cache);
        assert!(fetcher.fetch_with(&second, &request()).await?.from_cache);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_retries_503_then_succeeds() -> Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .with_priority(1)
            .expect(2)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = fetcher(3);
        let outcome = fetcher
            .fetch_with(&format!("{}/flaky", mock_server.uri()), &request())
            .await?;
        assert_eq!(outcome.html, "recovered");
        assert_eq!(outcome.attempts, 3);
        assert!(!outcome.from_cache);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_404_is_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = fetcher(5);
        let err = fetcher
            .fetch_with(&format!("{}/missing", mock_server.uri()), &request())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Client { .. }));
        assert_eq!(err.attempts(), 1);
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        // failures are never cached
        assert_eq!(fetcher.cache().stats().await.entry_count, 0);
    }

    #[tokio::test]
    async fn test_fetch_exhausts_retries_on_500() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&mock_server)
            .await;

        let fetcher = fetcher(3);
        let err = fetcher
            .fetch_with(&format!("{}/down", mock_server.uri()), &request())
            .await
            .unwrap_err();

        match err {
            FetchError::Exhausted {
                attempts, status, ..
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(status, Some(StatusCode::INTERNAL_SERVER_ERROR));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("slow content")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let fetcher = fetcher(2);
        let req = FetchRequest::new(Duration::from_millis(100), "trend_scraper-test/1.0");
        let err = fetcher
            .fetch_with(&format!("{}/slow", mock_server.uri()), &req)
            .await
            .unwrap_err();

        assert_eq!(err.attempts(), 2);
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn test_fetch_sends_user_agent() -> Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ua"))
            .and(header("user-agent", "custom-agent/2.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = fetcher(1);
        let outcome = fetcher
            .fetch(
                &format!("{}/ua", mock_server.uri()),
                Duration::from_secs(5),
                "custom-agent/2.0",
            )
            .await?;
        assert_eq!(outcome.html, "hello");
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_without_cache_always_hits_network() -> Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_string("fresh"))
            .expect(2)
            .mount(&mock_server)
            .await;

        let fetcher = fetcher(1);
        let url = format!("{}/fresh", mock_server.uri());
        let req = request().use_cache(false);

        assert!(!fetcher.fetch_with(&url, &req).await?.from_cache);
        assert!(!fetcher.fetch_with(&url, &req).await?.from_cache);
        assert_eq!(fetcher.cache().stats().await.entry_count, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_params_partition_cache() -> Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("page"))
            .expect(2)
            .mount(&mock_server)
            .await;

        let fetcher = fetcher(1);
        let url = format!("{}/page", mock_server.uri());

        assert!(!fetcher.fetch_with(&url, &request()).await?.from_cache);
        let v2 = request().param("version", "2");
        assert!(!fetcher.fetch_with(&url, &v2).await?.from_cache);
        assert!(fetcher.fetch_with(&url, &v2).await?.from_cache);
        Ok(())
    }

    #[derive(Debug)]
    struct DownBackend;

    #[async_trait]
    impl CacheBackend for DownBackend {
        fn name(&self) -> &'static str {
            "down"
        }
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("down".to_string()))
        }
        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("down".to_string()))
        }
        async fn delete(&self, _key: &str) -> Result<bool, CacheError> {
            Err(CacheError::Unavailable("down".to_string()))
        }
        async fn clear_all(&self) -> Result<u64, CacheError> {
            Err(CacheError::Unavailable("down".to_string()))
        }
        async fn entry_count(&self) -> Result<u64, CacheError> {
            Err(CacheError::Unavailable("down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_unavailable_cache_does_not_block_fetch() -> Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(200).set_body_string("a"))
            .expect(2)
            .mount(&mock_server)
            .await;

        let cache = Arc::new(CacheStore::new(Arc::new(DownBackend), Duration::from_secs(60)));
        let fetcher = ContentFetcher::new(cache, fast_policy(1))?;
        let url = format!("{}/a", mock_server.uri());

        assert_eq!(fetcher.fetch_with(&url, &request()).await?.html, "a");
        assert!(!fetcher.fetch_with(&url, &request()).await?.from_cache);
        Ok(())
    }

    #[tokio::test]
    async fn test_fail_hard_cache_surfaces_error() {
        let cache = Arc::new(
            CacheStore::new(Arc::new(DownBackend), Duration::from_secs(60)).fail_hard(true),
        );
        let fetcher = ContentFetcher::new(cache, fast_policy(1)).unwrap();
        let err = fetcher
            .fetch_with("https://example.invalid/", &request())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Cache(_)));
    }
}
