//! Data models for extracted trends.
//!
//! - [`Trend`]: one extracted item, validated at construction and immutable afterwards
//! - [`TrendBuilder`]: the only way to construct a [`Trend`]
//! - [`TrendCollection`]: the ordered result of one scrape of one source
//!
//! Both types serialize to JSON; this is the wire contract the output layer consumes.
//! A serialized [`TrendCollection`] carries a `total_count` field, which is always
//! recomputed from the trends and ignored on input.

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::TrendError;

/// One extracted content item.
///
/// Fields are private: a `Trend` is validated once by [`TrendBuilder::build`] and
/// cannot be changed afterwards.
///
/// # Equality
///
/// Tags behave as a set for equality (order is ignored) but keep their insertion
/// order for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "TrendRecord")]
pub struct Trend {
    title: String,
    url: Option<String>,
    summary: Option<String>,
    tags: Vec<String>,
    source: String,
    fetched_at: DateTime<Utc>,
}

impl Trend {
    /// Start building a trend with its two required attributes.
    pub fn builder(title: impl Into<String>, source: impl Into<String>) -> TrendBuilder {
        TrendBuilder {
            title: title.into(),
            source: source.into(),
            url: None,
            summary: None,
            tags: Vec::new(),
            fetched_at: None,
        }
    }

    /// Trimmed, never-empty headline.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Absolute link to the item, if the source provided one.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Tags in insertion order, without duplicates.
    /// Tags in insertion order, trimmed and without duplicates.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Name of the scraper that produced this trend.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// When the trend was extracted.
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }
}

impl PartialEq for Trend {
    fn eq(&self, other: &Self) -> bool {
        self.title == other.title
            && self.url == other.url
            && self.summary == other.summary
            && self.source == other.source
            && self.fetched_at == other.fetched_at
            && self.tags.iter().collect::<HashSet<_>>() == other.tags.iter().collect::<HashSet<_>>()
    }
}

impl Eq for Trend {}

/// Builder for [`Trend`]. Validation happens in [`TrendBuilder::build`].
#[derive(Debug, Clone)]
pub struct TrendBuilder {
    title: String,
    source: String,
    url: Option<String>,
    summary: Option<String>,
    tags: Vec<String>,
    fetched_at: Option<DateTime<Utc>>,
}

impl TrendBuilder {
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Override the timestamp. Defaults to the time of [`TrendBuilder::build`].
    pub fn fetched_at(mut self, at: DateTime<Utc>) -> Self {
        self.fetched_at = Some(at);
        self
    }

    /// Validate and construct the trend.
    ///
    /// # Errors
    ///
    /// - [`TrendError::EmptyTitle`] if the title is empty after trimming
    /// - [`TrendError::RelativeUrl`] if a url was given and is not absolute
    pub fn build(self) -> Result<Trend, TrendError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(TrendError::EmptyTitle);
        }

        let url = match self.url {
            Some(raw) => match url::Url::parse(raw.trim()) {
                Ok(parsed) if !parsed.cannot_be_a_base() => Some(parsed.to_string()),
                _ => return Err(TrendError::RelativeUrl(raw)),
            },
            None => None,
        };

        let summary = self
            .summary
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let tags = self
            .tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unique()
            .collect();

        Ok(Trend {
            title,
            url,
            summary,
            tags,
            source: self.source,
            fetched_at: self.fetched_at.unwrap_or_else(Utc::now),
        })
    }
}

/// Serialized shape of a [`Trend`]; deserialization re-runs validation.
#[derive(Deserialize)]
struct TrendRecord {
    title: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    source: String,
    fetched_at: DateTime<Utc>,
}

impl TryFrom<TrendRecord> for Trend {
    type Error = TrendError;

    fn try_from(record: TrendRecord) -> Result<Self, Self::Error> {
        let mut builder = Trend::builder(record.title, record.source)
            .tags(record.tags)
            .fetched_at(record.fetched_at);
        if let Some(url) = record.url {
            builder = builder.url(url);
        }
        if let Some(summary) = record.summary {
            builder = builder.summary(summary);
        }
        builder.build()
    }
}

/// Ordered batch of trends from one scrape of one source.
///
/// `total_count` is derived from the trend list and cannot be set independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CollectionRecord", into = "CollectionRecord")]
pub struct TrendCollection {
    source: String,
    scraped_at: DateTime<Utc>,
    trends: Vec<Trend>,
}

impl TrendCollection {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            scraped_at: Utc::now(),
            trends: Vec::new(),
        }
    }

    pub fn with_trends(source: impl Into<String>, trends: Vec<Trend>) -> Self {
        Self {
            trends,
            ..Self::new(source)
        }
    }

    /// Append a trend, keeping document order.
    pub fn push(&mut self, trend: Trend) {
        self.trends.push(trend);
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// When the collection was assembled.
    pub fn scraped_at(&self) -> DateTime<Utc> {
        self.scraped_at
    }

    pub fn trends(&self) -> &[Trend] {
        &self.trends
    }

    pub fn into_trends(self) -> Vec<Trend> {
        self.trends
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Trend> {
        self.trends.iter()
    }

    /// Number of trends; always equal to `self.trends().len()`.
    pub fn total_count(&self) -> usize {
        self.trends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trends.is_empty()
    }
}

impl Extend<Trend> for TrendCollection {
    fn extend<T: IntoIterator<Item = Trend>>(&mut self, iter: T) {
        self.trends.extend(iter);
    }
}

impl<'a> IntoIterator for &'a TrendCollection {
    type Item = &'a Trend;
    type IntoIter = std::slice::Iter<'a, Trend>;

    fn into_iter(self) -> Self::IntoIter {
        self.trends.iter()
    }
}

#[derive(Serialize, Deserialize)]
struct CollectionRecord {
    source: String,
    scraped_at: DateTime<Utc>,
    #[serde(default)]
    total_count: usize,
    trends: Vec<Trend>,
}

impl From<CollectionRecord> for TrendCollection {
    fn from(record: CollectionRecord) -> Self {
        Self {
            source: record.source,
            scraped_at: record.scraped_at,
            trends: record.trends,
        }
    }
}

impl From<TrendCollection> for CollectionRecord {
    fn from(collection: TrendCollection) -> Self {
        Self {
            total_count: collection.total_count(),
            source: collection.source,
            scraped_at: collection.scraped_at,
            trends: collection.trends,
        }
    }
}
