//! Scraper registry and dispatcher.
//!
//! [`ScraperManager`] maps source names to a [`Scraper`] and its target URL, and
//! runs the pipeline for one or all sources:
//!
//! ```text
//! scrape(name) -> resolve registration -> ContentFetcher (cache-aware) -> parse_content -> TrendCollection
//! ```
//!
//! Parsed collections are cached too (when enabled), keyed by target URL, source
//! name, and the scraper's [`Scraper::fingerprint`], so a result is only ever served
//! to the scraper that produced it. Replacing or unregistering a source also drops
//! every parsed entry this manager wrote for that name.
//!
//! [`ScraperManager::scrape_all`] runs every registered source independently;
//! one source's failure is captured in the [`BatchReport`] and never aborts the
//! others.

use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::cache::{CacheStats, cache_key};
use crate::config::Settings;
use crate::error::{Error, FetchError, Result};
use crate::fetcher::{ContentFetcher, FetchRequest, parse_http_url};
use crate::models::TrendCollection;
use crate::scrapers::{Scraper, SelectorScraper, TechCrunchScraper, techcrunch};
use crate::utils::truncate_for_log;

/// How each scrape fetches and caches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeOptions {
    pub timeout: Duration,
    pub user_agent: String,
    /// When false, neither raw HTML nor parsed results are read from or written to the cache.
    pub use_cache: bool,
    pub cache_parsed: bool,
    pub max_concurrency: usize,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Settings::default().scrape_options()
    }
}

#[derive(Clone)]
struct Registration {
    scraper: Arc<dyn Scraper>,
    target: Url,
    fingerprint: String,
}

/// Results of a batch scrape, keyed by source name.
///
/// Every registered source has exactly one entry, successful or not.
#[derive(Debug, Default)]
pub struct BatchReport {
    results: BTreeMap<String, Result<TrendCollection>>,
}

impl BatchReport {
    /// Outcome for `name`, or `None` if it was not part of the batch.
    pub fn get(&self, name: &str) -> Option<&Result<TrendCollection>> {
        self.results.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Result<TrendCollection>)> {
        self.results.iter().map(|(name, result)| (name.as_str(), result))
    }

    pub fn successes(&self) -> impl Iterator<Item = (&str, &TrendCollection)> {
        self.iter()
            .filter_map(|(name, result)| result.as_ref().ok().map(|c| (name, c)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.iter()
            .filter_map(|(name, result)| result.as_ref().err().map(|e| (name, e)))
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, Result<TrendCollection>> {
        self.results
    }
}

impl From<BTreeMap<String, Result<TrendCollection>>> for BatchReport {
    fn from(results: BTreeMap<String, Result<TrendCollection>>) -> Self {
        Self { results }
    }
}

pub struct ScraperManager {
    fetcher: ContentFetcher,
    options: ScrapeOptions,
    registrations: BTreeMap<String, Registration>,
    /// Parsed-result keys written per source name, so they can be dropped on replace.
    parsed_keys: Mutex<HashMap<String, HashSet<String>>>,
}

impl fmt::Debug for ScraperManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScraperManager")
            .field("fetcher", &self.fetcher)
            .field("options", &self.options)
            .field("sources", &self.names())
            .finish()
    }
}

impl ScraperManager {
    /// Create an empty registry.
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Shared fetcher, and through it the cache
    /// * `options` - Timeout, user agent, and cache switches applied to every scrape
    pub fn new(fetcher: ContentFetcher, options: ScrapeOptions) -> Self {
        Self {
            fetcher,
            options,
            registrations: BTreeMap::new(),
            parsed_keys: Mutex::new(HashMap::new()),
        }
    }

    /// Build a manager from settings and register the built-in and configured sources.
    pub fn from_settings(
        settings: &Settings,
        cache: Arc<crate::cache::CacheStore>,
    ) -> Result<Self> {
        let fetcher = ContentFetcher::new(cache, settings.retry_policy())?;
        let mut manager = Self::new(fetcher, settings.scrape_options());

        manager.register(
            techcrunch::SOURCE,
            TechCrunchScraper::new(),
            &settings.techcrunch_url,
        )?;
        for source in &settings.sources {
            let scraper = SelectorScraper::new(source.name.as_str(), &source.selectors)?;
            manager.register(&source.name, scraper, &source.url)?;
        }
        Ok(manager)
    }

    pub fn options(&self) -> &ScrapeOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut ScrapeOptions {
        &mut self.options
    }

    /// Registered source names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.registrations.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registrations.contains_key(name)
    }

    pub fn target_url(&self, name: &str) -> Option<&str> {
        self.registrations.get(name).map(|r| r.target.as_str())
    }

    fn registration(name: &str, scraper: Arc<dyn Scraper>, target_url: &str) -> Result<Registration> {
        let target = parse_http_url(target_url).map_err(|_| Error::InvalidTarget {
            name: name.to_string(),
            url: target_url.to_string(),
        })?;
        let fingerprint = scraper.fingerprint();
        Ok(Registration {
            scraper,
            target,
            fingerprint,
        })
    }

    /// Register `scraper` under `name`.
    ///
    /// # Errors
    ///
    /// - [`Error::Conflict`] if `name` is taken; use [`ScraperManager::replace`] to overwrite
    /// - [`Error::InvalidTarget`] if `target_url` is not an absolute http(s) URL
    pub fn register<S>(&mut self, name: &str, scraper: S, target_url: &str) -> Result<()>
    where
        S: Scraper + 'static,
    {
        if self.registrations.contains_key(name) {
            return Err(Error::Conflict {
                name: name.to_string(),
            });
        }
        let registration = Self::registration(name, Arc::new(scraper), target_url)?;
        self.registrations.insert(name.to_string(), registration);
        info!(name, target = target_url, "Registered scraper");
        Ok(())
    }

    /// Register `scraper` under `name`, overwriting any existing registration.
    ///
    /// Returns `true` if a previous registration was replaced. Its cached parsed
    /// result is dropped.
    pub async fn replace<S>(&mut self, name: &str, scraper: S, target_url: &str) -> Result<bool>
    where
        S: Scraper + 'static,
    {
        let registration = Self::registration(name, Arc::new(scraper), target_url)?;
        let previous = self.registrations.insert(name.to_string(), registration);
        if let Some(previous) = &previous {
            self.forget_parsed(name, previous).await;
        }
        info!(name, target = target_url, replaced = previous.is_some(), "Registered scraper");
        Ok(previous.is_some())
    }

    /// Remove the registration for `name` and its cached parsed result.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if `name` is not registered.
    pub async fn unregister(&mut self, name: &str) -> Result<()> {
        let previous = self
            .registrations
            .remove(name)
            .ok_or_else(|| Error::NotFound {
                name: name.to_string(),
            })?;
        self.forget_parsed(name, &previous).await;
        info!(name, "Unregistered scraper");
        Ok(())
    }

    /// Fetch and parse one source.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for an unknown name; otherwise the fetch or parse error, unchanged.
    pub async fn scrape(&self, name: &str) -> Result<TrendCollection> {
        let registration = self
            .registrations
            .get(name)
            .ok_or_else(|| Error::NotFound {
                name: name.to_string(),
            })?;
        self.run(name, registration).await
    }

    /// Scrape `target_url` with the scraper registered under `name`, leaving the
    /// registration itself untouched.
    pub async fn scrape_at(&self, name: &str, target_url: &str) -> Result<TrendCollection> {
        let scraper = self
            .registrations
            .get(name)
            .map(|r| Arc::clone(&r.scraper))
            .ok_or_else(|| Error::NotFound {
                name: name.to_string(),
            })?;
        let registration = Self::registration(name, scraper, target_url)?;
        self.run(name, &registration).await
    }

    /// Scrape every registered source, up to `max_concurrency` at a time.
    #[instrument(level = "info", skip_all, fields(sources = self.registrations.len()))]
    pub async fn scrape_all(&self) -> BatchReport {
        let t0 = Instant::now();
        let results: BTreeMap<String, Result<TrendCollection>> =
            stream::iter(self.registrations.iter())
                .map(|(name, registration)| async move {
                    let result = self.run(name, registration).await;
                    if let Err(e) = &result {
                        error!(source = %name, kind = e.kind(), error = %e, "Source failed; continuing batch");
                    }
                    (name.clone(), result)
                })
                .buffer_unordered(self.options.max_concurrency.max(1))
                .collect()
                .await;

        let report = BatchReport { results };
        info!(
            succeeded = report.success_count(),
            failed = report.failure_count(),
            elapsed_ms = t0.elapsed().as_millis(),
            "Batch scrape complete"
        );
        report
    }

    /// Remove every cache entry. Returns how many were removed.
    pub async fn cache_clear(&self) -> u64 {
        let removed = self.fetcher.cache().clear_all().await;
        info!(removed, "Cleared cache");
        removed
    }

    /// Hit/miss counters for this process and the backend's live entry count.
    pub async fn cache_stats(&self) -> CacheStats {
        self.fetcher.cache().stats().await
    }

    pub fn cache_backend(&self) -> &'static str {
        self.fetcher.cache().backend_name()
    }

    pub async fn cache_ping(&self) -> bool {
        self.fetcher.cache().ping().await
    }

    fn parsed_key(name: &str, registration: &Registration) -> String {
        let params = BTreeMap::from([
            ("kind".to_string(), "trends".to_string()),
            ("scraper".to_string(), name.to_string()),
            ("fingerprint".to_string(), registration.fingerprint.clone()),
        ]);
        cache_key(&registration.target, &params)
    }

    fn parsed_keys(&self) -> MutexGuard<'_, HashMap<String, HashSet<String>>> {
        self.parsed_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Delete every parsed entry written for `name`, including the one under
    /// `previous`'s target that an earlier process may have written.
    async fn forget_parsed(&self, name: &str, previous: &Registration) {
        let mut keys = self.parsed_keys().remove(name).unwrap_or_default();
        keys.insert(Self::parsed_key(name, previous));

        let mut dropped = 0usize;
        for key in &keys {
            if self.fetcher.cache().delete(key).await {
                dropped += 1;
            }
        }
        if dropped > 0 {
            debug!(name, dropped, "Dropped cached parse results");
        }
    }

    #[instrument(level = "info", skip_all, fields(source = %name, target = %registration.target))]
    async fn run(&self, name: &str, registration: &Registration) -> Result<TrendCollection> {
        let t0 = Instant::now();
        let use_parsed_cache = self.options.use_cache && self.options.cache_parsed;
        let parsed_key = Self::parsed_key(name, registration);

        if use_parsed_cache {
            let cached = self
                .fetcher
                .cache()
                .get(&parsed_key)
                .await
                .map_err(FetchError::from)?;
            if let Some(cached) = cached {
                match serde_json::from_str::<TrendCollection>(&cached) {
                    Ok(collection) => {
                        info!(count = collection.total_count(), "Using cached parse result");
                        return Ok(collection);
                    }
                    Err(e) => warn!(
                        error = %e,
                        payload = %truncate_for_log(&cached, 120),
                        "Cached parse result is unreadable; scraping again"
                    ),
                }
            }
        }

        let request = FetchRequest::new(self.options.timeout, self.options.user_agent.as_str())
            .use_cache(self.options.use_cache);
        let outcome = self
            .fetcher
            .fetch_with(registration.target.as_str(), &request)
            .await?;

        let collection = registration
            .scraper
            .parse_content(&outcome.html, registration.target.as_str())?;

        if use_parsed_cache {
            match serde_json::to_string(&collection) {
                Ok(json) => {
                    self.fetcher.cache().set(&parsed_key, &json, None).await;
                    self.parsed_keys()
                        .entry(name.to_string())
                        .or_default()
                        .insert(parsed_key);
                }
                Err(e) => warn!(error = %e, "Could not serialize parse result for caching"),
            }
        }

        info!(
            count = collection.total_count(),
            from_cache = outcome.from_cache,
            elapsed_ms = t0.elapsed().as_millis(),
            "Scrape completed"
        );
        Ok(collection)
    }
}
