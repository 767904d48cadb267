// src/scrape/config.rs
//! Source definitions: loaded from TOML, turned into registered scrapers at startup.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::scrape::fetch::Fetcher;
use crate::scrape::providers::{
    rss::DEFAULT_TOPIC_TERMS, HtmlListingScraper, HtmlSelectors, RssFeedOptions, RssFeedScraper,
};
use crate::scrape::query::QueryMode;
use crate::scrape::types::{Scraper, SourceKind, SourceRegistration};

pub const ENV_SOURCES_PATH: &str = "SCRAPER_SOURCES_PATH";
pub const DEFAULT_SOURCES_PATH: &str = "config/sources.toml";

fn default_rate_limit() -> f64 {
    1.0
}

fn default_max_items() -> usize {
    10
}

/// One `[[source]]` table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceDef {
    pub name: String,
    pub kind: SourceKind,
    pub base_url: String,
    #[serde(default = "default_rate_limit")]
    pub rate_limit: f64,

    // rss
    #[serde(default)]
    pub feeds: Vec<String>,
    #[serde(default = "default_max_items")]
    pub max_items_per_feed: usize,
    #[serde(default)]
    pub topic_terms: Option<Vec<String>>,
    #[serde(default)]
    pub fetch_full_text: bool,

    // html
    #[serde(default)]
    pub listing_url: Option<String>,
    #[serde(default)]
    pub selectors: Option<HtmlSelectors>,
}

impl SourceDef {
    pub fn registration(&self) -> SourceRegistration {
        SourceRegistration::new(&self.name, self.kind, &self.base_url, self.rate_limit)
    }
}

#[derive(Debug, Deserialize)]
struct SourcesFile {
    #[serde(rename = "source", default)]
    sources: Vec<SourceDef>,
}

/// Built-in fallback: the general tech news RSS source.
pub fn default_sources() -> Vec<SourceDef> {
    vec![SourceDef {
        name: "tech_news".to_string(),
        kind: SourceKind::Rss,
        base_url: "https://news.google.com/rss".to_string(),
        rate_limit: 2.0,
        feeds: vec![
            "https://techcrunch.com/feed/".to_string(),
            "https://www.theverge.com/rss/index.xml".to_string(),
            "https://feeds.feedburner.com/TechCrunch/".to_string(),
            "https://www.wired.com/feed/rss".to_string(),
        ],
        // Full pages feed the analyzer; 4 feeds + 20 pages at 2s stay inside the 60s source bound.
        max_items_per_feed: 5,
        topic_terms: None,
        fetch_full_text: true,
        listing_url: None,
        selectors: None,
    }]
}

pub fn parse_sources(s: &str) -> Result<Vec<SourceDef>> {
    let file: SourcesFile = toml::from_str(s).context("parsing sources toml")?;
    validate(&file.sources)?;
    Ok(file.sources)
}

pub fn load_sources_from(path: &Path) -> Result<Vec<SourceDef>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    parse_sources(&content)
}

/// Load source definitions using env var + fallbacks:
/// 1) $SCRAPER_SOURCES_PATH (must exist)
/// 2) config/sources.toml
/// 3) built-in `default_sources()`
pub fn load_sources_default() -> Result<Vec<SourceDef>> {
    if let Ok(p) = std::env::var(ENV_SOURCES_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_sources_from(&pb);
        }
        return Err(anyhow!("{ENV_SOURCES_PATH} points to non-existent path"));
    }
    let pb = PathBuf::from(DEFAULT_SOURCES_PATH);
    if pb.exists() {
        return load_sources_from(&pb);
    }
    Ok(default_sources())
}

fn validate(defs: &[SourceDef]) -> Result<()> {
    let mut names = HashSet::new();
    for d in defs {
        if d.name.trim().is_empty() {
            bail!("source with empty name");
        }
        if !names.insert(d.name.as_str()) {
            bail!("duplicate source name: {}", d.name);
        }
        if !d.rate_limit.is_finite() || d.rate_limit < 0.0 {
            bail!("source {}: rate_limit must be a non-negative number", d.name);
        }
        match d.kind {
            SourceKind::Rss if d.feeds.is_empty() => {
                bail!("rss source {} needs at least one feed", d.name)
            }
            SourceKind::Html if d.selectors.is_none() => {
                bail!("html source {} needs a [source.selectors] table", d.name)
            }
            _ => {}
        }
    }
    Ok(())
}

/// Build scrapers for `defs`, registering each source's interval on the fetcher's limiter.
pub fn build_scrapers(
    defs: &[SourceDef],
    fetcher: &Fetcher,
    query_mode: QueryMode,
) -> Result<Vec<Arc<dyn Scraper>>> {
    let mut out: Vec<Arc<dyn Scraper>> = Vec::with_capacity(defs.len());
    for d in defs {
        let reg = d.registration();
        fetcher.limiter().register(&reg.name, reg.min_interval());

        match d.kind {
            SourceKind::Rss => {
                let options = RssFeedOptions {
                    feeds: d.feeds.clone(),
                    max_items_per_feed: d.max_items_per_feed,
                    topic_terms: d.topic_terms.clone().unwrap_or_else(|| {
                        DEFAULT_TOPIC_TERMS.iter().map(|s| s.to_string()).collect()
                    }),
                    fetch_full_text: d.fetch_full_text,
                    query_mode,
                };
                out.push(Arc::new(RssFeedScraper::new(reg, options, fetcher.clone())));
            }
            SourceKind::Html => {
                let selectors = d
                    .selectors
                    .as_ref()
                    .ok_or_else(|| anyhow!("html source {} has no selectors", d.name))?;
                let listing = d.listing_url.clone().unwrap_or_else(|| d.base_url.clone());
                let scraper = HtmlListingScraper::new(reg, listing, selectors, fetcher.clone())
                    .with_context(|| format!("building html source {}", d.name))?
                    .with_query_mode(query_mode);
                out.push(Arc::new(scraper));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::ManagerSettings;
    use std::time::Duration;

    const SAMPLE: &str = r#"
[[source]]
name = "ai_blog"
kind = "rss"
base_url = "https://blog.test"
rate_limit = 0.5
feeds = ["https://blog.test/feed.xml"]
topic_terms = []

[[source]]
name = "eng_news"
kind = "html"
base_url = "https://news.test"
listing_url = "https://news.test/latest"

[source.selectors]
item = "article.card"
title = "h2"
date = "time"
"#;

    #[test]
    fn parses_rss_and_html_sources() {
        let defs = parse_sources(SAMPLE).unwrap();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].rate_limit, 0.5);
        assert_eq!(defs[0].max_items_per_feed, 10);
        assert!(defs[0].topic_terms.as_ref().is_some_and(|t| t.is_empty()));
        let sel = defs[1].selectors.as_ref().unwrap();
        assert_eq!(sel.link, "a[href]");
        assert_eq!(sel.date.as_deref(), Some("time"));
        assert_eq!(defs[1].rate_limit, 1.0);
    }

    #[test]
    fn rejects_duplicates_and_incomplete_sources() {
        let dup = r#"
[[source]]
name = "a"
kind = "rss"
base_url = "https://a.test"
feeds = ["https://a.test/f"]
[[source]]
name = "a"
kind = "rss"
base_url = "https://a.test"
feeds = ["https://a.test/g"]
"#;
        assert!(parse_sources(dup).is_err());

        let no_feeds = r#"
[[source]]
name = "a"
kind = "rss"
base_url = "https://a.test"
"#;
        assert!(parse_sources(no_feeds).is_err());

        let negative = r#"
[[source]]
name = "a"
kind = "rss"
base_url = "https://a.test"
rate_limit = -1.0
feeds = ["https://a.test/f"]
"#;
        assert!(parse_sources(negative).is_err());
    }

    #[test]
    fn default_sources_are_valid() {
        let defs = default_sources();
        validate(&defs).unwrap();
        assert_eq!(defs[0].name, "tech_news");
        assert_eq!(defs[0].rate_limit, 2.0);
        assert!(defs[0].fetch_full_text);
    }

    #[test]
    fn shipped_sources_file_fetches_full_text_within_source_bound() {
        let defs = parse_sources(include_str!("../../config/sources.toml")).unwrap();
        let tech = defs.iter().find(|d| d.name == "tech_news").unwrap();
        assert!(tech.fetch_full_text);

        let requests = tech.feeds.len() * (1 + tech.max_items_per_feed);
        let worst_case = Duration::from_secs_f64(requests as f64 * tech.rate_limit);
        assert!(worst_case < ManagerSettings::default().source_timeout);
    }
}
