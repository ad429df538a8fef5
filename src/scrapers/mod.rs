//! Source-specific scrapers.
//!
//! A scraper turns the raw HTML of one page into a [`TrendCollection`]. Parsing
//! is a pure function of its inputs: no network or cache access happens inside
//! [`Scraper::parse_content`], so each implementation can be tested against
//! fixture HTML.
//!
//! # Supported Sources
//!
//! | Source | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | TechCrunch | [`techcrunch`] | HTML scraping | Article links, container fallback, keyword tags |
//! | Any site | [`selector`] | CSS selectors | Declared in the YAML config under `sources` |
//!
//! New sources are added by implementing [`Scraper`] and registering the value
//! with [`crate::manager::ScraperManager::register`]; the dispatcher does not change.

pub mod selector;
pub mod techcrunch;

pub use selector::{SelectorScraper, SelectorSpec};
pub use techcrunch::TechCrunchScraper;

use crate::error::ParseError;
use crate::models::TrendCollection;

/// Capability contract for one source site.
pub trait Scraper: Send + Sync {
    /// Extract trends from `html`, which was fetched from `source_url`.
    ///
    /// Trends must appear in document order.
    ///
    /// # Errors
    ///
    /// [`ParseError`] when the HTML does not have the structure this scraper expects.
    fn parse_content(&self, html: &str, source_url: &str) -> Result<TrendCollection, ParseError>;

    /// Identifies the parsing behaviour. Cached parse results are keyed by it,
    /// so a result is never served to a scraper with a different fingerprint.
    ///
    /// Defaults to the implementing type's name; implementations whose output
    /// depends on configuration or a parser revision should override it.
    fn fingerprint(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

impl<F> Scraper for F
where
    F: Fn(&str, &str) -> Result<TrendCollection, ParseError> + Send + Sync,
{
    fn parse_content(&self, html: &str, source_url: &str) -> Result<TrendCollection, ParseError> {
        self(html, source_url)
    }
}

/// Resolve `href` against the page URL, keeping only http(s) results.
pub(crate) fn resolve_link(source_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let base = url::Url::parse(source_url).ok()?;
    let resolved = base.join(href).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}
