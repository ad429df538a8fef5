//! Runtime settings.
//!
//! Settings are resolved in three layers:
//!
//! 1. Built-in defaults ([`Settings::default`])
//! 2. An optional YAML file (`--config path`)
//! 3. CLI flags and environment variables, applied by the binary
//!
//! # Example
//!
//! ```yaml
//! cache_url: redis://localhost:6379
//! cache_ttl_secs: 1800
//! request_timeout_secs: 20
//! max_attempts: 4
//! sources:
//!   - name: hackernews
//!     url: https://news.ycombinator.com/
//!     selectors:
//!       item: tr.athing
//!       title: span.titleline > a
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{info, instrument, warn};

use crate::cache::{CacheStore, RedisCache};
use crate::error::{Error, Result};
use crate::fetcher::RetryPolicy;
use crate::manager::ScrapeOptions;
use crate::scrapers::SelectorSpec;
use crate::scrapers::techcrunch;

/// A config-declared source scraped with a [`crate::scrapers::SelectorScraper`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    pub selectors: SelectorSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// External cache service (e.g. `redis://localhost:6379`). `None` keeps the cache in-process.
    pub cache_url: Option<String>,
    pub cache_ttl_secs: u64,
    /// Propagate cache read failures instead of degrading to a miss.
    pub cache_fail_hard: bool,
    /// Also cache parsed trend collections, not just raw HTML.
    pub cache_parsed: bool,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub max_attempts: usize,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub backoff_jitter_ms: u64,
    /// Parallel sources in a batch scrape.
    pub max_concurrency: usize,
    /// Target of the built-in TechCrunch source.
    pub techcrunch_url: String,
    pub sources: Vec<SourceConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_url: None,
            cache_ttl_secs: 3600,
            cache_fail_hard: false,
            cache_parsed: true,
            request_timeout_secs: 30,
            user_agent: concat!("trend_scraper/", env!("CARGO_PKG_VERSION")).to_string(),
            max_attempts: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
            backoff_jitter_ms: 250,
            max_concurrency: 4,
            techcrunch_url: techcrunch::DEFAULT_URL.to_string(),
            sources: Vec::new(),
        }
    }
}

impl Settings {
    /// Load defaults, overlaid with the YAML file at `path` if given.
    #[instrument(level = "info", skip_all)]
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path).await.map_err(|e| {
            Error::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        let settings = Self::from_yaml(&raw)?;
        info!(path = %path.display(), sources = settings.sources.len(), "Loaded configuration");
        Ok(settings)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        // an empty file deserializes to unit, not to an empty map
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw).map_err(|e| Error::Config(format!("invalid config: {e}")))
    }

    /// Check invariants the rest of the crate relies on.
    pub fn validate(&self) -> Result<()> {
        if self.cache_ttl_secs == 0 {
            return Err(Error::Config("cache_ttl_secs must be at least 1".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs must be at least 1".to_string()));
        }
        if self.max_attempts == 0 {
            return Err(Error::Config("max_attempts must be at least 1".to_string()));
        }
        if self.backoff_base_ms > self.backoff_max_ms {
            return Err(Error::Config(format!(
                "backoff_base_ms ({}) must not exceed backoff_max_ms ({})",
                self.backoff_base_ms, self.backoff_max_ms
            )));
        }
        if self.user_agent.trim().is_empty() {
            return Err(Error::Config("user_agent must not be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(Error::Config("source name must not be empty".to_string()));
            }
            if !seen.insert(source.name.as_str()) {
                return Err(Error::Config(format!(
                    "source '{}' is declared more than once",
                    source.name
                )));
            }
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.backoff_base_ms),
            max_delay: Duration::from_millis(self.backoff_max_ms),
            jitter: Duration::from_millis(self.backoff_jitter_ms),
        }
    }

    pub fn scrape_options(&self) -> ScrapeOptions {
        ScrapeOptions {
            timeout: Duration::from_secs(self.request_timeout_secs),
            user_agent: self.user_agent.clone(),
            use_cache: true,
            cache_parsed: self.cache_parsed,
            max_concurrency: self.max_concurrency.max(1),
        }
    }

    /// Build the cache store described by these settings.
    ///
    /// An unreachable cache service falls back to the in-process cache, unless
    /// `cache_fail_hard` is set, in which case startup fails.
    pub async fn connect_cache(&self) -> Result<Arc<CacheStore>> {
        let ttl = self.cache_ttl();
        let Some(url) = self.cache_url.as_deref() else {
            return Ok(Arc::new(CacheStore::in_memory(ttl)));
        };

        match RedisCache::connect(url).await {
            Ok(redis) => Ok(Arc::new(
                CacheStore::new(Arc::new(redis), ttl).fail_hard(self.cache_fail_hard),
            )),
            Err(e) if self.cache_fail_hard => Err(Error::Config(format!(
                "cache service at {url} is unavailable: {e}"
            ))),
            Err(e) => {
                warn!(%url, error = %e, "cache service unavailable; falling back to in-memory cache");
                Ok(Arc::new(CacheStore::in_memory(ttl)))
            }
        }
    }
}
