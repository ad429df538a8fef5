//! Config-driven scraper built from CSS selectors.
//!
//! Lets an operator add a simple listing site from the YAML config without
//! writing code:
//!
//! ```yaml
//! sources:
//!   - name: hackernews
//!     url: https://news.ycombinator.com/
//!     selectors:
//!       item: "tr.athing"
//!       title: "span.titleline > a"
//! ```
//!
//! If no `link` selector is given, the title element's own `href` is used.

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use super::{Scraper, resolve_link};
use crate::error::{Error, ParseError};
use crate::models::{Trend, TrendCollection};
use crate::utils::collapse_whitespace;

/// Raw selector strings, as they appear in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorSpec {
    /// One match per trend.
    pub item: String,
    /// Headline, searched within each item.
    pub title: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    /// Every match within the item becomes a tag.
    #[serde(default)]
    pub tags: Option<String>,
    /// Keep at most this many items.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl SelectorSpec {
    /// Stable digest of every field, so edited selectors never reuse cached results.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        let fields = [
            Some(&self.item),
            Some(&self.title),
            self.link.as_ref(),
            self.summary.as_ref(),
            self.tags.as_ref(),
        ];
        for part in fields {
            match part {
                Some(raw) => {
                    hasher.update(b"+");
                    hasher.update(raw.as_bytes());
                }
                None => hasher.update(b"-"),
            }
            hasher.update(b"\n");
        }
        if let Some(limit) = self.limit {
            hasher.update(limit.to_string().as_bytes());
        }
        format!("selector/{:x}", hasher.finalize())
    }
}

#[derive(Debug, Clone)]
pub struct SelectorScraper {
    source: String,
    item: Selector,
    title: Selector,
    link: Option<Selector>,
    summary: Option<Selector>,
    tags: Option<Selector>,
    limit: usize,
    fingerprint: String,
}

fn compile(source: &str, raw: &str) -> Result<Selector, Error> {
    Selector::parse(raw)
        .map_err(|e| Error::Config(format!("invalid selector '{raw}' for source '{source}': {e}")))
}

impl SelectorScraper {
    /// Compile `spec` for the source named `source`.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if any selector does not parse.
    pub fn new(source: impl Into<String>, spec: &SelectorSpec) -> Result<Self, Error> {
        let source = source.into();
        let optional = |raw: &Option<String>| raw.as_deref().map(|r| compile(&source, r)).transpose();
        Ok(Self {
            item: compile(&source, &spec.item)?,
            title: compile(&source, &spec.title)?,
            link: optional(&spec.link)?,
            summary: optional(&spec.summary)?,
            tags: optional(&spec.tags)?,
            limit: spec.limit.unwrap_or(usize::MAX),
            fingerprint: spec.fingerprint(),
            source,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn trend_from_item(&self, item: ElementRef<'_>, source_url: &str) -> Option<Trend> {
        let title_element = item.select(&self.title).next()?;
        let title = text_of(title_element);

        let href = match &self.link {
            Some(link) => item
                .select(link)
                .next()
                .and_then(|el| el.value().attr("href")),
            None => title_element.value().attr("href"),
        };

        let mut builder = Trend::builder(title, self.source.as_str());
        if let Some(url) = href.and_then(|h| resolve_link(source_url, h)) {
            builder = builder.url(url);
        }
        if let Some(summary) = self
            .summary
            .as_ref()
            .and_then(|sel| item.select(sel).next())
        {
            builder = builder.summary(text_of(summary));
        }
        if let Some(tags) = &self.tags {
            builder = builder.tags(item.select(tags).map(text_of));
        }

        builder
            .build()
            .map_err(|e| debug!(error = %e, "skipping item"))
            .ok()
    }
}

fn text_of(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

impl Scraper for SelectorScraper {
    #[instrument(level = "info", skip_all, fields(source = %self.source, %source_url))]
    fn parse_content(&self, html: &str, source_url: &str) -> Result<TrendCollection, ParseError> {
        let document = Html::parse_document(html);
        let items: Vec<_> = document.select(&self.item).collect();
        if items.is_empty() {
            return Err(ParseError::new(source_url, "no elements match the item selector"));
        }

        let trends: Vec<Trend> = items
            .into_iter()
            .filter_map(|item| self.trend_from_item(item, source_url))
            .take(self.limit)
            .collect();
        if trends.is_empty() {
            return Err(ParseError::new(
                source_url,
                "item elements found but none had a non-empty title",
            ));
        }

        info!(count = trends.len(), "Parsed selector trends");
        Ok(TrendCollection::with_trends(self.source.as_str(), trends))
    }

    fn fingerprint(&self) -> String {
        self.fingerprint.clone()
    }
}
