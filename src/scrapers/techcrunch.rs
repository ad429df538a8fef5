//! TechCrunch scraper.
//!
//! Scrapes trend items from [TechCrunch](https://techcrunch.com) listing pages.
//! Two strategies are tried in order:
//!
//! 1. **Article links**: anchors whose href has a `/YYYY/` date segment and whose
//!    text looks like a headline (15 to 200 characters, not navigation).
//! 2. **Article containers**: if no links qualify, the first container selector
//!    that matches (`article`, `.post`, ...) is scanned for a headline link.
//!
//! At most 15 items are kept. Tags come from a fixed keyword table applied to the
//! title and summary.
//!
//! # URL Pattern
//!
//! Relative hrefs are resolved against the page URL, e.g.
//! `/2025/05/06/article-slug/` becomes `https://techcrunch.com/2025/05/06/article-slug/`.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

use super::{Scraper, resolve_link};
use crate::error::ParseError;
use crate::models::{Trend, TrendCollection};
use crate::utils::{collapse_whitespace, truncate_chars};

/// Source name stamped on every trend.
pub const SOURCE: &str = "techcrunch";
/// Front page; the default registration target.
pub const DEFAULT_URL: &str = "https://techcrunch.com/";

/// Bump whenever a change here alters what a page parses to; it invalidates
/// cached parse results written by older builds.
const PARSER_REVISION: u32 = 1;
const MAX_ITEMS: usize = 15;
const MAX_TAGS: usize = 5;
const SUMMARY_MAX_CHARS: usize = 300;
const SKIP_TEXTS: &[&str] = &[
    "read more",
    "continue reading",
    "techcrunch",
    "subscribe",
    "newsletter",
    "follow us",
];

const CONTAINER_SELECTORS: &[&str] = &[
    "article",
    r#"[data-module="ArticleLink"]"#,
    r#"[data-module="ClickGoal"]"#,
    ".post",
    ".story",
    ".card",
    r#"div[class*="post"]"#,
    r#"div[class*="story"]"#,
    r#"div[class*="article"]"#,
];

const TITLE_SELECTORS: &[&str] = &[
    "h1 a",
    "h2 a",
    "h3 a",
    "h4 a",
    r#"a[data-module="ClickGoal"]"#,
    ".title a",
    ".headline a",
    r#"a[href*="/20"]"#,
];

const SUMMARY_SELECTORS: &[&str] = &[
    ".excerpt",
    ".summary",
    ".description",
    r#"p[class*="excerpt"]"#,
    r#"div[class*="excerpt"]"#,
    "p",
    "div",
];

const TAG_KEYWORDS: &[(&str, &[&str])] = &[
    ("ai", &["ai", "artificial intelligence", "machine learning", "ml", "llm"]),
    ("startup", &["startup", "founded", "launches", "new company"]),
    ("funding", &["funding", "raises", "investment", "series a", "series b", "round"]),
    ("crypto", &["crypto", "bitcoin", "blockchain", "web3", "nft"]),
    ("mobile", &["app", "mobile", "ios", "android", "iphone"]),
    ("saas", &["saas", "software", "platform", "service"]),
    ("fintech", &["fintech", "payments", "banking", "finance"]),
    ("security", &["security", "breach", "hack", "cybersecurity"]),
    ("acquisition", &["acquired", "acquisition", "buys", "merger"]),
    ("product", &["product", "feature", "update", "release"]),
];

fn compile(list: &[&str]) -> Vec<Selector> {
    list.iter()
        .map(|s| Selector::parse(s).expect("static selector is valid"))
        .collect()
}

static LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("static selector is valid"));
static NEARBY_SUMMARY: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p[class], div[class]").expect("static selector is valid"));
static CONTAINERS: Lazy<Vec<Selector>> = Lazy::new(|| compile(CONTAINER_SELECTORS));
static TITLES: Lazy<Vec<Selector>> = Lazy::new(|| compile(TITLE_SELECTORS));
static SUMMARIES: Lazy<Vec<Selector>> = Lazy::new(|| compile(SUMMARY_SELECTORS));

static DATED_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/20\d{2}/").expect("static regex is valid"));
static TAG_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    TAG_KEYWORDS
        .iter()
        .map(|(tag, words)| {
            let alternatives = words
                .iter()
                .map(|w| regex::escape(w))
                .collect::<Vec<_>>()
                .join("|");
            let re = Regex::new(&format!(r"\b(?:{alternatives})\b"))
                .expect("static regex is valid");
            (*tag, re)
        })
        .collect()
});

#[derive(Debug, Clone, Copy, Default)]
pub struct TechCrunchScraper;

impl TechCrunchScraper {
    pub fn new() -> Self {
        Self
    }
}

impl Scraper for TechCrunchScraper {
    #[instrument(level = "info", skip_all, fields(%source_url))]
    fn parse_content(&self, html: &str, source_url: &str) -> Result<TrendCollection, ParseError> {
        let document = Html::parse_document(html);

        let mut trends = trends_from_links(&document, source_url);
        if trends.is_empty() {
            debug!("no article links found; trying article containers");
            trends = trends_from_containers(&document, source_url);
        }

        if trends.is_empty() {
            return Err(ParseError::new(
                source_url,
                "no article links or article containers found",
            ));
        }

        info!(count = trends.len(), "Parsed TechCrunch trends");
        Ok(TrendCollection::with_trends(SOURCE, trends))
    }

    fn fingerprint(&self) -> String {
        format!("{SOURCE}/r{PARSER_REVISION}")
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

fn is_article_link(href: &str, text: &str) -> bool {
    if href.is_empty() || text.is_empty() || !DATED_PATH.is_match(href) {
        return false;
    }
    let len = text.chars().count();
    if !(15..=200).contains(&len) {
        return false;
    }
    let lower = text.to_lowercase();
    !SKIP_TEXTS.iter().any(|skip| lower.contains(skip))
}

fn trends_from_links(document: &Html, source_url: &str) -> Vec<Trend> {
    let mut seen = HashSet::new();
    document
        .select(&LINK)
        .filter_map(|link| {
            let href = link.value().attr("href")?;
            let title = element_text(link);
            if !is_article_link(href, &title) || !seen.insert(href.to_string()) {
                return None;
            }
            let url = resolve_link(source_url, href)?;
            build_trend(title, url, summary_near(link))
        })
        .take(MAX_ITEMS)
        .collect()
}

/// Look up to three ancestors above the link for an excerpt/summary block.
fn summary_near(link: ElementRef<'_>) -> String {
    for ancestor in link.ancestors().filter_map(ElementRef::wrap).take(3) {
        let candidate = ancestor.select(&NEARBY_SUMMARY).find(|el| {
            el.value().classes().any(|class| {
                let class = class.to_lowercase();
                class.contains("excerpt") || class.contains("summary")
            })
        });
        if let Some(candidate) = candidate {
            let summary = element_text(candidate);
            if summary.chars().count() > 20 {
                return truncate_chars(&summary, SUMMARY_MAX_CHARS).to_string();
            }
        }
    }
    String::new()
}

fn trends_from_containers(document: &Html, source_url: &str) -> Vec<Trend> {
    let Some((selector, articles)) = CONTAINERS.iter().find_map(|selector| {
        let found: Vec<_> = document.select(selector).collect();
        (!found.is_empty()).then_some((selector, found))
    }) else {
        return Vec::new();
    };
    debug!(count = articles.len(), ?selector, "Found article containers");

    articles
        .into_iter()
        .take(MAX_ITEMS)
        .filter_map(|article| {
            let title_element = TITLES.iter().find_map(|sel| {
                article
                    .select(sel)
                    .find(|el| !element_text(*el).is_empty())
            })?;
            let title = element_text(title_element);
            if title.chars().count() < 10 {
                return None;
            }
            let url = resolve_link(source_url, title_element.value().attr("href")?)?;
            build_trend(title, url, container_summary(article))
        })
        .collect()
}

fn container_summary(article: ElementRef<'_>) -> String {
    for selector in SUMMARIES.iter() {
        for element in article.select(selector) {
            let summary = element_text(element);
            let len = summary.chars().count();
            if len > 20 && len < 500 {
                return truncate_chars(&summary, SUMMARY_MAX_CHARS).to_string();
            }
        }
    }
    String::new()
}

/// Keyword tags for a headline and summary, in table order, at most five.
pub fn extract_tags(title: &str, summary: &str) -> Vec<&'static str> {
    let text = format!("{title} {summary}").to_lowercase();
    TAG_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(&text))
        .map(|(tag, _)| *tag)
        .take(MAX_TAGS)
        .collect()
}

fn build_trend(title: String, url: String, summary: String) -> Option<Trend> {
    let tags = extract_tags(&title, &summary);
    let mut builder = Trend::builder(title, SOURCE).url(url).tags(tags);
    if !summary.is_empty() {
        builder = builder.summary(summary);
    }
    builder
        .build()
        .map_err(|e| debug!(error = %e, "skipping invalid trend"))
        .ok()
}
