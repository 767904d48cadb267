// src/scrape/providers/html.rs
//! CSS-selector driven listing page scraper and main-text extraction.
//!
//! `scraper::Html` is not `Send`, so every parse happens in a plain function that
//! returns owned values before the next `.await`.

use anyhow::anyhow;
use async_trait::async_trait;
use metrics::counter;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::scrape::fetch::Fetcher;
use crate::scrape::query::{QueryFilter, QueryMode};
use crate::scrape::types::{ScrapeError, ScrapedArticle, Scraper, SourceRegistration};
use crate::scrape::{normalize_text, parse_timestamp};

/// Selectors tried in order; the first one yielding text wins.
static MAIN_TEXT_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        "article p, article li",
        "main p, main li",
        "div.content p, div.content li",
        "p",
    ]
    .iter()
    .filter_map(|s| Selector::parse(s).ok())
    .collect()
});

/// Extract readable body text from an article page.
pub fn extract_main_text(html: &str) -> String {
    let document = Html::parse_document(html);
    for selector in MAIN_TEXT_SELECTORS.iter() {
        let parts: Vec<String> = document
            .select(selector)
            .map(|e| e.text().collect::<Vec<_>>().join(" "))
            .filter(|t| !t.trim().is_empty())
            .collect();
        if !parts.is_empty() {
            return normalize_text(&parts.join(" "));
        }
    }
    String::new()
}

/// Raw selector configuration, as written in `sources.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtmlSelectors {
    /// One match per article on the listing page.
    pub item: String,
    /// Title element inside an item.
    #[serde(default = "default_title_selector")]
    pub title: String,
    /// Element carrying `href`; may match the item itself.
    #[serde(default = "default_link_selector")]
    pub link: String,
    #[serde(default)]
    pub summary: Option<String>,
    /// Element with a `datetime` attribute or a date as text.
    #[serde(default)]
    pub date: Option<String>,
}

fn default_title_selector() -> String {
    "h2, h3, a".to_string()
}

fn default_link_selector() -> String {
    "a[href]".to_string()
}

struct CompiledSelectors {
    item: Selector,
    title: Selector,
    link: Selector,
    summary: Option<Selector>,
    date: Option<Selector>,
}

fn compile(sel: &str) -> anyhow::Result<Selector> {
    Selector::parse(sel).map_err(|e| anyhow!("invalid css selector {sel:?}: {e:?}"))
}

impl CompiledSelectors {
    fn from_config(cfg: &HtmlSelectors) -> anyhow::Result<Self> {
        Ok(Self {
            item: compile(&cfg.item)?,
            title: compile(&cfg.title)?,
            link: compile(&cfg.link)?,
            summary: cfg.summary.as_deref().map(compile).transpose()?,
            date: cfg.date.as_deref().map(compile).transpose()?,
        })
    }
}

enum Mode {
    Http(Fetcher),
    Fixture(String),
}

pub struct HtmlListingScraper {
    registration: SourceRegistration,
    listing_url: String,
    selectors: CompiledSelectors,
    query_mode: QueryMode,
    mode: Mode,
}

impl HtmlListingScraper {
    pub fn new(
        registration: SourceRegistration,
        listing_url: impl Into<String>,
        selectors: &HtmlSelectors,
        fetcher: Fetcher,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            listing_url: listing_url.into(),
            selectors: CompiledSelectors::from_config(selectors)?,
            registration,
            query_mode: QueryMode::default(),
            mode: Mode::Http(fetcher),
        })
    }

    /// Parse a fixed listing page; relative links resolve against `base_url`.
    pub fn from_fixture_str(
        registration: SourceRegistration,
        selectors: &HtmlSelectors,
        html: &str,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            listing_url: registration.base_url.clone(),
            selectors: CompiledSelectors::from_config(selectors)?,
            registration,
            query_mode: QueryMode::default(),
            mode: Mode::Fixture(html.to_string()),
        })
    }

    pub fn with_query_mode(mut self, mode: QueryMode) -> Self {
        self.query_mode = mode;
        self
    }

    fn parse_listing(&self, html: &str) -> Vec<ScrapedArticle> {
        let source = self.name();
        let base = Url::parse(&self.listing_url).ok();
        let document = Html::parse_document(html);

        let mut out = Vec::new();
        for (idx, item) in document.select(&self.selectors.item).enumerate() {
            let Some(href) = self.link_of(&item) else {
                tracing::warn!(source, item = idx, "skipping listing item without link");
                continue;
            };
            let Some(url) = resolve_link(base.as_ref(), &href) else {
                tracing::warn!(source, href = %href, "skipping listing item with unresolvable link");
                continue;
            };

            let title = item
                .select(&self.selectors.title)
                .next()
                .map(|e| element_text(&e))
                .unwrap_or_default();
            if title.is_empty() {
                tracing::warn!(source, %url, "skipping listing item without title");
                continue;
            }

            let summary = self
                .selectors
                .summary
                .as_ref()
                .and_then(|s| item.select(s).next())
                .map(|e| element_text(&e))
                .filter(|s| !s.is_empty());

            let published_at = self
                .selectors
                .date
                .as_ref()
                .and_then(|s| item.select(s).next())
                .and_then(|e| {
                    let raw = e
                        .value()
                        .attr("datetime")
                        .map(str::to_string)
                        .unwrap_or_else(|| element_text(&e));
                    let parsed = parse_timestamp(&raw);
                    if parsed.is_none() {
                        tracing::warn!(source, %url, raw = %raw, "unparsable listing date");
                    }
                    parsed
                });

            let text = summary.clone().unwrap_or_default();
            let mut article = ScrapedArticle::new(source, url, title, text).published(published_at);
            article.summary = summary;
            out.push(article);
        }
        out
    }

    fn link_of(&self, item: &ElementRef<'_>) -> Option<String> {
        let link_el = if self.selectors.link.matches(item) {
            Some(*item)
        } else {
            item.select(&self.selectors.link).next()
        };
        link_el
            .and_then(|e| e.value().attr("href"))
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
    }
}

fn element_text(e: &ElementRef<'_>) -> String {
    normalize_text(&e.text().collect::<Vec<_>>().join(" "))
}

fn resolve_link(base: Option<&Url>, href: &str) -> Option<String> {
    if let Ok(abs) = Url::parse(href) {
        return Some(abs.to_string());
    }
    base.and_then(|b| b.join(href).ok()).map(|u| u.to_string())
}

#[async_trait]
impl Scraper for HtmlListingScraper {
    fn registration(&self) -> &SourceRegistration {
        &self.registration
    }

    async fn scrape(&self, query: Option<&str>) -> Result<Vec<ScrapedArticle>, ScrapeError> {
        let body = match &self.mode {
            Mode::Fixture(html) => html.clone(),
            Mode::Http(fetcher) => fetcher.get_text(self.name(), &self.listing_url).await?,
        };

        let filter = QueryFilter::new(query, self.query_mode);
        let out: Vec<ScrapedArticle> = self
            .parse_listing(&body)
            .into_iter()
            .filter(|a| filter.matches(&a.title, &a.text))
            .collect();

        counter!("scrape_articles_total", "source" => self.name().to_string())
            .increment(out.len() as u64);
        Ok(out)
    }
}
