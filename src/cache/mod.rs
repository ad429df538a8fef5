//! Cache layer: key derivation, TTL-bounded storage, and hit/miss accounting.
//!
//! [`CacheStore`] wraps a [`CacheBackend`] and enforces the caching policy:
//!
//! - backend failures on read degrade to a miss (unless the store is fail-hard)
//! - backend failures on write, delete, and clear are logged and swallowed
//! - hit and miss counters are owned by the store and only readable by callers
//!
//! Two backends are provided: [`MemoryCache`] (in-process map) and
//! [`RedisCache`] (external key-value service).

pub mod memory;
pub mod redis;

pub use self::memory::MemoryCache;
pub use self::redis::RedisCache;

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::CacheError;

/// Prefix shared by every key this crate writes; scopes `clear_all` on shared stores.
pub const KEY_PREFIX: &str = "trend_scraper:";

/// Storage primitive behind a [`CacheStore`].
///
/// Implementations report their own failures; the store decides whether to absorb them.
/// An entry must never be returned by `get` once its TTL has elapsed.
#[async_trait]
pub trait CacheBackend: Send + Sync + fmt::Debug {
    /// Short backend label for logs and stats output.
    fn name(&self) -> &'static str;

    /// Value for `key`, or `None` if it is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value`, replacing any previous entry for `key`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Returns `true` if an entry was removed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Remove every entry written by this crate. Returns the number removed.
    async fn clear_all(&self) -> Result<u64, CacheError>;

    /// Number of live (unexpired) entries.
    async fn entry_count(&self) -> Result<u64, CacheError>;

    /// Check connectivity. Backends with nothing to reach keep the default.
    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hit_count: u64,
    pub miss_count: u64,
    pub entry_count: u64,
}

/// Policy wrapper around a [`CacheBackend`].
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    default_ttl: Duration,
    fail_hard: bool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("backend", &self.backend)
            .field("default_ttl", &self.default_ttl)
            .field("fail_hard", &self.fail_hard)
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish()
    }
}

impl CacheStore {
    /// Wrap `backend` with the caching policy.
    ///
    /// # Arguments
    ///
    /// * `backend` - Storage the store reads and writes through
    /// * `default_ttl` - Lifetime of entries written without an explicit TTL
    ///
    /// # Returns
    ///
    /// A store that absorbs backend failures; chain [`CacheStore::fail_hard`] to change that.
    pub fn new(backend: Arc<dyn CacheBackend>, default_ttl: Duration) -> Self {
        Self {
            backend,
            default_ttl,
            fail_hard: false,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// In-process store; the usual choice for tests and single runs.
    pub fn in_memory(default_ttl: Duration) -> Self {
        Self::new(Arc::new(MemoryCache::new()), default_ttl)
    }

    /// Propagate backend read failures instead of treating them as misses.
    pub fn fail_hard(mut self, fail_hard: bool) -> Self {
        self.fail_hard = fail_hard;
        self
    }

    /// Label of the backing store (`"memory"`, `"redis"`).
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up a key.
    ///
    /// `Ok(None)` is a miss; `Ok(Some(""))` is a hit on an empty value. An error
    /// is only returned when the store is fail-hard.
    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self.backend.get(key).await {
            Ok(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key, backend = self.backend.name(), "cache hit");
                Ok(Some(value))
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key, backend = self.backend.name(), "cache miss");
                Ok(None)
            }
            Err(e) if self.fail_hard => Err(e),
            Err(e) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                warn!(key, backend = self.backend.name(), error = %e, "cache read failed; treating as miss");
                Ok(None)
            }
        }
    }

    /// Store a value. `ttl` falls back to the store default. Failures are logged only.
    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        match self.backend.set(key, value, ttl).await {
            Ok(()) => debug!(key, ttl_secs = ttl.as_secs(), bytes = value.len(), "cached value"),
            Err(e) => {
                warn!(key, backend = self.backend.name(), error = %e, "cache write failed; continuing uncached")
            }
        }
    }

    /// Remove one entry. Returns `false` if nothing was removed or the backend failed.
    pub async fn delete(&self, key: &str) -> bool {
        match self.backend.delete(key).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(key, backend = self.backend.name(), error = %e, "cache delete failed");
                false
            }
        }
    }

    /// Remove every entry. Returns how many were removed (0 if the backend failed).
    pub async fn clear_all(&self) -> u64 {
        match self.backend.clear_all().await {
            Ok(removed) => {
                debug!(removed, backend = self.backend.name(), "cache cleared");
                removed
            }
            Err(e) => {
                warn!(backend = self.backend.name(), error = %e, "cache clear failed");
                0
            }
        }
    }

    /// Counters since creation or the last [`CacheStore::reset_stats`].
    pub async fn stats(&self) -> CacheStats {
        let entry_count = match self.backend.entry_count().await {
            Ok(count) => count,
            Err(e) => {
                warn!(backend = self.backend.name(), error = %e, "cache entry count failed");
                0
            }
        };
        CacheStats {
            hit_count: self.hits.load(Ordering::Relaxed),
            miss_count: self.misses.load(Ordering::Relaxed),
            entry_count,
        }
    }

    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Whether the backing store is reachable.
    pub async fn ping(&self) -> bool {
        match self.backend.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!(backend = self.backend.name(), error = %e, "cache ping failed");
                false
            }
        }
    }
}

/// Canonical form of a URL for keying: scheme, host, port, path, and query
/// pairs sorted by name then value. The fragment is dropped.
pub fn normalize_url(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    pairs.sort();

    let mut normalized = format!("{}://", url.scheme());
    if let Some(host) = url.host_str() {
        normalized.push_str(host);
    }
    if let Some(port) = url.port() {
        normalized.push_str(&format!(":{port}"));
    }
    normalized.push_str(url.path());
    if !pairs.is_empty() {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        normalized.push('?');
        normalized.push_str(&query);
    }
    normalized
}

/// Derive the cache key for a URL and optional extra parameters (version, kind, ...).
///
/// # Arguments
///
/// * `url` - Target URL; equivalent spellings (query order, fragment, default port) collapse
/// * `params` - Extra key material, never sent to the server
///
/// # Returns
///
/// [`KEY_PREFIX`] followed by the hex SHA-256 of the normalised URL and params.
pub fn cache_key(url: &Url, params: &BTreeMap<String, String>) -> String {
    let mut material = normalize_url(url);
    for (name, value) in params {
        material.push('\n');
        material.push_str(name);
        material.push('=');
        material.push_str(value);
    }
    format!("{KEY_PREFIX}{:x}", Sha256::digest(material.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct BrokenBackend;

    #[async_trait]
    impl CacheBackend for BrokenBackend {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<bool, CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        async fn clear_all(&self) -> Result<u64, CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        async fn entry_count(&self) -> Result<u64, CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        async fn ping(&self) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_normalize_url_sorts_query_and_drops_fragment() {
        assert_eq!(
            normalize_url(&url("HTTPS://Example.COM/path?b=2&a=1#section")),
            "https://example.com/path?a=1&b=2"
        );
        assert_eq!(
            normalize_url(&url("http://example.com:8080/")),
            "http://example.com:8080/"
        );
        assert_eq!(
            normalize_url(&url("https://example.com:443/x")),
            "https://example.com/x"
        );
    }

    #[test]
    fn test_cache_key_equivalent_urls_match() {
        let none = BTreeMap::new();
        let a = cache_key(&url("https://example.com/news?b=2&a=1"), &none);
        let b = cache_key(&url("https://example.com/news?a=1&b=2#top"), &none);
        assert_eq!(a, b);
        assert!(a.starts_with(KEY_PREFIX));
        assert_eq!(a.len(), KEY_PREFIX.len() + 64);
    }

    #[test]
    fn test_cache_key_depends_on_params() {
        let u = url("https://example.com/news");
        let plain = cache_key(&u, &BTreeMap::new());
        let versioned = cache_key(
            &u,
            &BTreeMap::from([("version".to_string(), "2".to_string())]),
        );
        assert_ne!(plain, versioned);
    }

    #[tokio::test]
    async fn test_store_counts_hits_and_misses() {
        let store = CacheStore::in_memory(Duration::from_secs(60));

        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", "v", None).await;
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        store.set("empty", "", None).await;
        assert_eq!(store.get("empty").await.unwrap(), Some(String::new()));

        let stats = store.stats().await;
        assert_eq!(
            stats,
            CacheStats {
                hit_count: 2,
                miss_count: 1,
                entry_count: 2,
            }
        );

        store.reset_stats();
        let stats = store.stats().await;
        assert_eq!(stats.hit_count, 0);
        assert_eq!(stats.miss_count, 0);
        assert_eq!(stats.entry_count, 2);
    }

    #[tokio::test]
    async fn test_store_delete_and_clear() {
        let store = CacheStore::in_memory(Duration::from_secs(60));
        store.set("a", "1", None).await;
        store.set("b", "2", None).await;
        store.set("c", "3", None).await;

        assert!(store.delete("a").await);
        assert!(!store.delete("a").await);
        assert_eq!(store.clear_all().await, 2);
        assert_eq!(store.get("b").await.unwrap(), None);
        assert_eq!(store.stats().await.entry_count, 0);
    }

    #[tokio::test]
    async fn test_broken_backend_degrades_to_miss() {
        let store = CacheStore::new(Arc::new(BrokenBackend), Duration::from_secs(60));

        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", "v", None).await;
        assert!(!store.delete("k").await);
        assert_eq!(store.clear_all().await, 0);
        assert!(!store.ping().await);

        let stats = store.stats().await;
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.entry_count, 0);
    }

    #[tokio::test]
    async fn test_fail_hard_propagates_read_errors() {
        let store =
            CacheStore::new(Arc::new(BrokenBackend), Duration::from_secs(60)).fail_hard(true);
        assert!(store.get("k").await.is_err());
        // writes stay best-effort even when fail-hard
        store.set("k", "v", None).await;
    }
}
