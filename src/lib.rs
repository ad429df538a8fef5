//! # trend_scraper
//!
//! Fetches pages from known sites, extracts trend records, and caches both the
//! raw HTML and the parsed results.
//!
//! ## Architecture
//!
//! The pipeline for a single source:
//! 1. **Dispatch**: [`manager::ScraperManager`] resolves the source name to a scraper and target URL
//! 2. **Fetching**: [`fetcher::ContentFetcher`] consults the [`cache::CacheStore`], then
//!    downloads with retry and exponential backoff
//! 3. **Parsing**: a [`scrapers::Scraper`] turns HTML into a [`models::TrendCollection`]
//! 4. **Caching**: the parsed collection is stored alongside the raw HTML
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use trend_scraper::{CacheStore, ScraperManager, Settings};
//!
//! # async fn run() -> trend_scraper::Result<()> {
//! let settings = Settings::default();
//! let cache = Arc::new(CacheStore::in_memory(settings.cache_ttl()));
//! let manager = ScraperManager::from_settings(&settings, cache)?;
//! let trends = manager.scrape("techcrunch").await?;
//! println!("{} trends", trends.total_count());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod manager;
pub mod models;
pub mod outputs;
pub mod scrapers;
pub mod utils;

pub use cache::{CacheStats, CacheStore};
pub use config::Settings;
pub use error::{Error, Result};
pub use fetcher::{ContentFetcher, FetchRequest, RetryPolicy};
pub use manager::{BatchReport, ScrapeOptions, ScraperManager};
pub use models::{Trend, TrendCollection};
pub use scrapers::Scraper;
