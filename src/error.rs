//! Error types for the fetch, cache, parse, and registry layers.
//!
//! Each layer has its own error so callers can match on the exact failure:
//!
//! - [`FetchError`]: network, timeout, retries exhausted, or a permanent HTTP error
//! - [`ParseError`]: a scraper's input did not have the structure it expects
//! - [`CacheError`]: a backing-store failure; absorbed by [`crate::cache::CacheStore`]
//! - [`TrendError`]: invalid [`crate::models::Trend`] construction
//!
//! [`Error`] is the crate-level error returned by the manager and the CLI.

use reqwest::StatusCode;
use thiserror::Error;

/// Crate-level result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error returned by [`crate::manager::ScraperManager`] and the binary.
#[derive(Error, Debug)]
pub enum Error {
    /// Fetching the source's HTML failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The scraper could not extract trends from the fetched HTML.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A scraper is already registered under this name.
    #[error("scraper '{name}' is already registered")]
    Conflict { name: String },

    /// No scraper is registered under this name.
    #[error("scraper '{name}' is not registered")]
    NotFound { name: String },

    /// The target URL given at registration is not an absolute http(s) URL.
    #[error("invalid target url for '{name}': {url}")]
    InvalidTarget { name: String, url: String },

    /// Settings failed to load or validate.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Short, stable label for the error kind, used in user-facing reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch",
            Self::Parse(_) => "parse",
            Self::Conflict { .. } => "conflict",
            Self::NotFound { .. } => "not_found",
            Self::InvalidTarget { .. } => "invalid_target",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}

/// Failure to retrieve a page.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported url scheme in '{url}' (expected http or https)")]
    UnsupportedScheme { url: String },

    /// A 4xx response. Never retried: repeating the request cannot succeed.
    #[error("{url} returned {status} (client error, not retried)")]
    Client { url: String, status: StatusCode },

    /// Every attempt failed with a retryable error.
    #[error("{url} failed after {attempts} attempt(s): {last}")]
    Exhausted {
        url: String,
        attempts: usize,
        /// Status of the last response, if the server answered at all.
        status: Option<StatusCode>,
        /// Description of the last failure.
        last: String,
    },

    /// The cache is configured to fail hard and its backing store is unavailable.
    #[error("cache unavailable: {0}")]
    Cache(#[from] CacheError),

    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

impl FetchError {
    /// Number of HTTP attempts made before this error was returned.
    pub fn attempts(&self) -> usize {
        match self {
            Self::Client { .. } => 1,
            Self::Exhausted { attempts, .. } => *attempts,
            Self::InvalidUrl { .. }
            | Self::UnsupportedScheme { .. }
            | Self::Cache(_)
            | Self::Build(_) => 0,
        }
    }

    /// Last HTTP status observed, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Client { status, .. } => Some(*status),
            Self::Exhausted { status, .. } => *status,
            _ => None,
        }
    }
}

/// The HTML did not match what a scraper expects.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to parse {url}: {reason}")]
pub struct ParseError {
    pub url: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Backing-store failure. Only leaves [`crate::cache::CacheStore`] when it is fail-hard.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

/// Invalid trend construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrendError {
    #[error("trend title must not be empty")]
    EmptyTitle,

    #[error("trend url must be absolute: '{0}'")]
    RelativeUrl(String),
}
