//! Plain-text layouts.

use std::fmt::Write;

use crate::error::Error;
use crate::models::TrendCollection;

/// Header line, then each trend numbered with its link, summary, and tags.
pub fn summary(collection: &TrendCollection) -> String {
    let mut out = format!(
        "{} | {} trend(s) | scraped {}\n",
        collection.source(),
        collection.total_count(),
        collection.scraped_at().format("%Y-%m-%d %H:%M:%S UTC"),
    );
    for (i, trend) in collection.iter().enumerate() {
        // writing to a String cannot fail
        let _ = writeln!(out, "\n{}. {}", i + 1, trend.title());
        if let Some(url) = trend.url() {
            let _ = writeln!(out, "   {url}");
        }
        if let Some(summary) = trend.summary() {
            let _ = writeln!(out, "   {summary}");
        }
        if !trend.tags().is_empty() {
            let _ = writeln!(out, "   tags: {}", trend.tags().join(", "));
        }
    }
    out
}

pub fn titles(collection: &TrendCollection) -> String {
    collection
        .iter()
        .map(|t| format!("{}\n", t.title()))
        .collect()
}

pub fn failure_line(name: &str, err: &Error) -> String {
    format!("[{name}] {} error: {err}", err.kind())
}
