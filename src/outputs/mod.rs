//! Rendering of scrape results for the command line.
//!
//! # Submodules
//!
//! - [`json`]: pretty JSON, including `total_count` and per-source errors
//! - [`text`]: human-readable `summary` and `titles` layouts
//!
//! Rendered output goes to stdout, or to a file via [`write_output`].

use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

use crate::manager::BatchReport;
use crate::models::TrendCollection;
use crate::utils::ensure_parent_dir;

pub mod json;
pub mod text;

/// Output layout selected with `--format`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    /// Numbered trends with link, summary, and tags
    #[default]
    Summary,
    /// One title per line
    Titles,
    /// Pretty-printed JSON
    Json,
}

pub fn render_collection(collection: &TrendCollection, format: Format) -> crate::Result<String> {
    match format {
        Format::Summary => Ok(text::summary(collection)),
        Format::Titles => Ok(text::titles(collection)),
        Format::Json => json::collection_to_json(collection),
    }
}

/// Render every success in `report`, followed by each failed source and its error kind.
pub fn render_batch(report: &BatchReport, format: Format) -> crate::Result<String> {
    if format == Format::Json {
        return json::batch_to_json(report);
    }

    let mut out = String::new();
    for (_, collection) in report.successes() {
        out.push_str(&render_collection(collection, format)?);
        out.push('\n');
    }
    for (name, err) in report.failures() {
        out.push_str(&text::failure_line(name, err));
        out.push('\n');
    }
    Ok(out)
}

/// Write `rendered` to `path`, or to stdout when no path is given.
#[instrument(level = "info", skip_all)]
pub async fn write_output(rendered: &str, path: Option<&Path>) -> Result<(), Box<dyn Error>> {
    match path {
        Some(path) => {
            ensure_parent_dir(path).await?;
            fs::write(path, rendered).await?;
            info!(path = %path.display(), bytes = rendered.len(), "Wrote output file");
        }
        None => {
            print!("{rendered}");
            if !rendered.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(())
}
