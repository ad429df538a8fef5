//! # trend_scraper
//!
//! Operator CLI for the trend scraping pipeline.
//!
//! ## Usage
//!
//! ```sh
//! trend_scraper scrape --source techcrunch --format summary
//! trend_scraper scrape --all --format json --output ./out/trends.json
//! trend_scraper list
//! trend_scraper cache stats
//! trend_scraper cache clear
//! ```
//!
//! ## Startup
//!
//! 1. **Settings**: defaults, then `--config` YAML, then flags/environment
//! 2. **Cache**: connect to `CACHE_URL` if set, else (or on failure) use the in-memory cache
//! 3. **Registry**: register TechCrunch plus every YAML-declared source
//! 4. **Dispatch**: run the subcommand and render its output

use clap::Parser;
use std::error::Error;
use std::process::ExitCode;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

use trend_scraper::outputs::{self, text};
use trend_scraper::{ScraperManager, Settings};

mod cli;

use cli::{CacheCommand, Cli, Command, ScrapeArgs};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();

    // --- Tracing init ---
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tfmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("trend_scraper starting up");
    debug!(?args, "Parsed CLI arguments");

    let code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "trend_scraper failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    };

    let elapsed = start_time.elapsed();
    info!(
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    code
}

async fn run(args: Cli) -> Result<ExitCode, Box<dyn Error>> {
    let mut settings = Settings::load(args.config.as_deref()).await?;
    args.overrides.apply(&mut settings);
    settings.validate()?;

    let cache = settings.connect_cache().await?;
    let mut manager = ScraperManager::from_settings(&settings, cache)?;
    info!(sources = ?manager.names(), cache = manager.cache_backend(), "Scrapers registered");

    match args.command {
        Command::Scrape(scrape) => run_scrape(&mut manager, scrape).await,
        Command::List => {
            for name in manager.names() {
                println!("{name}\t{}", manager.target_url(name).unwrap_or_default());
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Cache(CacheCommand::Clear) => {
            let removed = manager.cache_clear().await;
            println!("Cleared {removed} cache entries");
            Ok(ExitCode::SUCCESS)
        }
        Command::Cache(CacheCommand::Stats) => {
            let reachable = manager.cache_ping().await;
            let stats = manager.cache_stats().await;
            println!("backend:   {}", manager.cache_backend());
            println!("reachable: {}", if reachable { "yes" } else { "no" });
            println!("entries:   {}", stats.entry_count);
            println!("hits:      {}", stats.hit_count);
            println!("misses:    {}", stats.miss_count);
            Ok(if reachable {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

#[instrument(level = "info", skip_all, fields(source = %scrape.source, all = scrape.all))]
async fn run_scrape(
    manager: &mut ScraperManager,
    scrape: ScrapeArgs,
) -> Result<ExitCode, Box<dyn Error>> {
    manager.options_mut().use_cache = !scrape.no_cache;

    if scrape.all {
        let report = manager.scrape_all().await;
        for (name, e) in report.failures() {
            warn!(source = name, kind = e.kind(), error = %e, "Source failed");
        }
        let rendered = outputs::render_batch(&report, scrape.format)?;
        outputs::write_output(&rendered, scrape.output.as_deref()).await?;

        // partial success still exits zero
        let all_failed = !report.is_empty() && report.success_count() == 0;
        return Ok(if all_failed {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        });
    }

    let result = match scrape.url.as_deref() {
        Some(url) => manager.scrape_at(&scrape.source, url).await,
        None => manager.scrape(&scrape.source).await,
    };
    match result {
        Ok(collection) => {
            let rendered = outputs::render_collection(&collection, scrape.format)?;
            outputs::write_output(&rendered, scrape.output.as_deref()).await?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(kind = e.kind(), error = %e, "Scrape failed");
            eprintln!("{}", text::failure_line(&scrape.source, &e));
            Ok(ExitCode::FAILURE)
        }
    }
}
