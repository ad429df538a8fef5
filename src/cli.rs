//! Command-line interface definitions for trend_scraper.
//!
//! Settings flags can also be provided through environment variables and
//! override values from the `--config` file.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use trend_scraper::Settings;
use trend_scraper::outputs::Format;

/// Scrape trending items from known sites, with a shared HTML and result cache.
///
/// # Examples
///
/// ```sh
/// # Scrape TechCrunch and print a summary
/// trend_scraper scrape
///
/// # Every registered source as JSON, bypassing the cache
/// trend_scraper scrape --all --no-cache --format json -o ./out/trends.json
///
/// # Use a shared Redis cache
/// CACHE_URL=redis://localhost:6379 trend_scraper cache stats
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML settings file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

/// Settings that can be set from the command line or environment.
#[derive(Args, Debug, Default)]
pub struct Overrides {
    /// Cache service URL, e.g. redis://localhost:6379 (in-memory cache if unset)
    #[arg(long, env = "CACHE_URL", global = true)]
    pub cache_url: Option<String>,

    /// Cache entry lifetime in seconds
    #[arg(long, env = "CACHE_TTL", global = true)]
    pub cache_ttl: Option<u64>,

    /// Fail instead of degrading when the cache service is unavailable
    #[arg(long, env = "CACHE_FAIL_HARD", global = true)]
    pub cache_fail_hard: bool,

    /// Per-attempt request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT", global = true)]
    pub request_timeout: Option<u64>,

    /// User-Agent header sent with every request
    #[arg(long, env = "USER_AGENT", global = true)]
    pub user_agent: Option<String>,

    /// Attempts per fetch, including the first
    #[arg(long, env = "MAX_ATTEMPTS", global = true)]
    pub max_attempts: Option<usize>,

    /// Target URL of the built-in TechCrunch source
    #[arg(long, env = "DEFAULT_SCRAPE_URL", global = true)]
    pub techcrunch_url: Option<String>,
}

impl Overrides {
    /// Overlay every value that was given onto `settings`.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(url) = &self.cache_url {
            settings.cache_url = Some(url.clone());
        }
        if let Some(ttl) = self.cache_ttl {
            settings.cache_ttl_secs = ttl;
        }
        if self.cache_fail_hard {
            settings.cache_fail_hard = true;
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout_secs = timeout;
        }
        if let Some(user_agent) = &self.user_agent {
            settings.user_agent = user_agent.clone();
        }
        if let Some(attempts) = self.max_attempts {
            settings.max_attempts = attempts;
        }
        if let Some(url) = &self.techcrunch_url {
            settings.techcrunch_url = url.clone();
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scrape one source, or every registered source with --all
    Scrape(ScrapeArgs),

    /// List registered sources and their target URLs
    List,

    /// Inspect or clear the cache
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Args, Debug)]
pub struct ScrapeArgs {
    /// Source to scrape
    #[arg(short, long, default_value = "techcrunch", conflicts_with = "all")]
    pub source: String,

    /// Scrape every registered source
    #[arg(long)]
    pub all: bool,

    /// Scrape this URL instead of the source's registered target
    #[arg(short, long, conflicts_with = "all")]
    pub url: Option<String>,

    /// Bypass the cache for reads and writes
    #[arg(long)]
    pub no_cache: bool,

    /// Output layout
    #[arg(short, long, value_enum, default_value_t = Format::Summary)]
    pub format: Format,

    /// Write output to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheCommand {
    /// Remove every cached entry
    Clear,
    /// Show backend, connectivity, and entry counts
    Stats,
}
