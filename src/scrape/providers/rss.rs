// src/scrape/providers/rss.rs
//! RSS 2.0 feed scraper. One registered source may aggregate several feeds.

use std::collections::HashSet;

use async_trait::async_trait;
use metrics::counter;
use quick_xml::de::from_str;
use regex::Regex;
use serde::Deserialize;

use crate::scrape::fetch::Fetcher;
use crate::scrape::providers::{collapse_failures, html::extract_main_text};
use crate::scrape::query::{QueryFilter, QueryMode};
use crate::scrape::types::{ScrapeError, ScrapedArticle, Scraper, SourceRegistration};
use crate::scrape::{normalize_text, parse_timestamp};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    author: Option<String>,
}

/// Terms that mark an entry as AI/automation related.
pub const DEFAULT_TOPIC_TERMS: &[&str] = &[
    "ai",
    "artificial intelligence",
    "automation",
    "ml",
    "machine learning",
];

#[derive(Debug, Clone)]
pub struct RssFeedOptions {
    pub feeds: Vec<String>,
    pub max_items_per_feed: usize,
    /// Entries must mention one of these in title or description. Empty disables the gate.
    pub topic_terms: Vec<String>,
    /// Download each linked page and use its main text instead of the feed description.
    pub fetch_full_text: bool,
    pub query_mode: QueryMode,
}

impl Default for RssFeedOptions {
    fn default() -> Self {
        Self {
            feeds: Vec::new(),
            max_items_per_feed: 10,
            topic_terms: DEFAULT_TOPIC_TERMS.iter().map(|s| s.to_string()).collect(),
            fetch_full_text: false,
            query_mode: QueryMode::default(),
        }
    }
}

enum Mode {
    Http(Fetcher),
    Fixture(Vec<String>),
}

pub struct RssFeedScraper {
    registration: SourceRegistration,
    options: RssFeedOptions,
    topic: Option<Regex>,
    mode: Mode,
}

impl RssFeedScraper {
    pub fn new(registration: SourceRegistration, options: RssFeedOptions, fetcher: Fetcher) -> Self {
        let topic = topic_regex(&options.topic_terms);
        Self {
            registration,
            options,
            topic,
            mode: Mode::Http(fetcher),
        }
    }

    /// Serve fixed XML documents instead of fetching `options.feeds`.
    pub fn from_fixture_str(
        registration: SourceRegistration,
        options: RssFeedOptions,
        xml: &str,
    ) -> Self {
        let topic = topic_regex(&options.topic_terms);
        Self {
            registration,
            options,
            topic,
            mode: Mode::Fixture(vec![xml.to_string()]),
        }
    }

    pub fn options(&self) -> &RssFeedOptions {
        &self.options
    }

    async fn load_documents(&self) -> Result<Vec<String>, ScrapeError> {
        let fetcher = match &self.mode {
            Mode::Fixture(docs) => return Ok(docs.clone()),
            Mode::Http(f) => f,
        };

        let name = self.name();
        let mut docs = Vec::with_capacity(self.options.feeds.len());
        let mut failures = Vec::new();
        for feed in &self.options.feeds {
            match fetcher.get_text(name, feed).await {
                Ok(body) => docs.push(body),
                Err(e) => {
                    tracing::warn!(error = %e, source = name, feed = %feed, "feed fetch failed");
                    failures.push(e);
                }
            }
        }

        if docs.is_empty() && !failures.is_empty() {
            return Err(collapse_failures(name, failures));
        }
        Ok(docs)
    }

    fn on_topic(&self, title: &str, summary: &str) -> bool {
        match &self.topic {
            Some(re) => re.is_match(title) || re.is_match(summary),
            None => true,
        }
    }

    async fn with_full_text(&self, mut article: ScrapedArticle) -> ScrapedArticle {
        let Mode::Http(fetcher) = &self.mode else {
            return article;
        };
        match fetcher.get_text(self.name(), &article.url).await {
            Ok(page) => {
                let text = extract_main_text(&page);
                if !text.is_empty() {
                    article.text = text;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, url = %article.url, "full text fetch failed; keeping feed description");
            }
        }
        article
    }
}

#[async_trait]
impl Scraper for RssFeedScraper {
    fn registration(&self) -> &SourceRegistration {
        &self.registration
    }

    async fn scrape(&self, query: Option<&str>) -> Result<Vec<ScrapedArticle>, ScrapeError> {
        let name = self.name();
        let filter = QueryFilter::new(query, self.options.query_mode);
        let docs = self.load_documents().await?;

        let mut parse_failures = 0usize;
        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut out = Vec::new();

        for doc in &docs {
            let articles = match parse_feed(name, doc, self.options.max_items_per_feed) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(error = %e, source = name, "feed parse failed");
                    parse_failures += 1;
                    continue;
                }
            };

            for article in articles {
                if !seen_urls.insert(article.url.clone()) {
                    continue;
                }
                let summary = article.summary.as_deref().unwrap_or_default();
                if !self.on_topic(&article.title, summary) {
                    continue;
                }
                let article = if self.options.fetch_full_text {
                    self.with_full_text(article).await
                } else {
                    article
                };
                if filter.matches(&article.title, &article.text) {
                    out.push(article);
                }
            }
        }

        if !docs.is_empty() && parse_failures == docs.len() {
            return Err(ScrapeError::retrieval(name, "no feed could be parsed"));
        }

        counter!("scrape_articles_total", "source" => name.to_string()).increment(out.len() as u64);
        Ok(out)
    }
}

/// Parse one RSS document. Items without a link or any text are skipped with a warning.
pub fn parse_feed(
    source: &str,
    xml: &str,
    max_items: usize,
) -> Result<Vec<ScrapedArticle>, quick_xml::de::DeError> {
    let xml_clean = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&xml_clean)?;

    let mut out = Vec::with_capacity(rss.channel.item.len().min(max_items));
    for (idx, it) in rss.channel.item.into_iter().take(max_items).enumerate() {
        let Some(url) = it.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()) else {
            tracing::warn!(source, item = idx, "skipping feed item without link");
            continue;
        };

        let title = normalize_text(it.title.as_deref().unwrap_or_default());
        let summary = normalize_text(it.description.as_deref().unwrap_or_default());
        if title.is_empty() && summary.is_empty() {
            tracing::warn!(source, %url, "skipping feed item without title or description");
            continue;
        }

        let published_at = match it.pub_date.as_deref() {
            Some(raw) => {
                let parsed = parse_timestamp(raw);
                if parsed.is_none() {
                    tracing::warn!(source, %url, raw, "unparsable pubDate");
                }
                parsed
            }
            None => None,
        };

        let mut article = ScrapedArticle::new(source, url, title, summary.clone()).published(published_at);
        if !summary.is_empty() {
            article.summary = Some(summary);
        }
        if let Some(author) = it.author.map(|a| normalize_text(&a)).filter(|a| !a.is_empty()) {
            article.authors.push(author);
        }
        out.push(article);
    }
    Ok(out)
}

fn topic_regex(terms: &[String]) -> Option<Regex> {
    let alternatives: Vec<String> = terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(regex::escape)
        .collect();
    if alternatives.is_empty() {
        return None;
    }
    let pattern = format!(r"(?i)(?:^|\W)(?:{})(?:\W|$)", alternatives.join("|"));
    Regex::new(&pattern).ok()
}

/// Replace HTML-only entities that are not valid in XML.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
