// src/scrape/manager.rs
//! Registry of named scrapers and the fan-out that runs them.

use std::collections::BTreeMap;
use std::pin::pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::bail;
use futures::stream::{self, StreamExt};
use metrics::counter;
use serde::Serialize;

use crate::analyze::ContentAnalyzer;
use crate::error::ErrorKind;
use crate::scrape::types::{ScrapeError, ScrapedArticle, Scraper, SourceRegistration};

#[derive(Debug, Clone, Copy)]
pub struct ManagerSettings {
    /// How many sources are scraped at once.
    pub max_concurrency: usize,
    /// Bound for a single source's `scrape` call.
    pub source_timeout: Duration,
    /// Bound for a whole `scrape_all` call.
    pub overall_timeout: Duration,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            source_timeout: Duration::from_secs(60),
            overall_timeout: Duration::from_secs(120),
        }
    }
}

/// Per-source result of an aggregate scrape.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    Ok { articles: Vec<ScrapedArticle> },
    Failed { kind: ErrorKind, message: String },
}

impl SourceOutcome {
    pub fn articles(&self) -> Option<&[ScrapedArticle]> {
        match self {
            SourceOutcome::Ok { articles } => Some(articles),
            SourceOutcome::Failed { .. } => None,
        }
    }

    pub fn failure_kind(&self) -> Option<ErrorKind> {
        match self {
            SourceOutcome::Ok { .. } => None,
            SourceOutcome::Failed { kind, .. } => Some(*kind),
        }
    }
}

impl From<Result<Vec<ScrapedArticle>, ScrapeError>> for SourceOutcome {
    fn from(r: Result<Vec<ScrapedArticle>, ScrapeError>) -> Self {
        match r {
            Ok(articles) => SourceOutcome::Ok { articles },
            Err(e) => SourceOutcome::Failed {
                kind: e.kind(),
                message: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScrapeReport {
    pub query: Option<String>,
    pub sources: BTreeMap<String, SourceOutcome>,
    pub elapsed_ms: u64,
}

impl ScrapeReport {
    pub fn failed_sources(&self) -> Vec<&str> {
        self.sources
            .iter()
            .filter(|(_, o)| o.failure_kind().is_some())
            .map(|(n, _)| n.as_str())
            .collect()
    }

    pub fn article_count(&self) -> usize {
        self.sources
            .values()
            .filter_map(SourceOutcome::articles)
            .map(<[ScrapedArticle]>::len)
            .sum()
    }

    /// All successful articles in one list, newest first; undated articles last.
    pub fn merged_newest_first(&self) -> Vec<ScrapedArticle> {
        let mut all: Vec<ScrapedArticle> = self
            .sources
            .values()
            .filter_map(SourceOutcome::articles)
            .flat_map(|a| a.iter().cloned())
            .collect();
        all.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        all
    }
}

pub struct ScraperManagerBuilder {
    scrapers: BTreeMap<String, Arc<dyn Scraper>>,
    analyzer: Option<Arc<ContentAnalyzer>>,
    settings: ManagerSettings,
}

impl ScraperManagerBuilder {
    pub fn new(settings: ManagerSettings) -> Self {
        Self {
            scrapers: BTreeMap::new(),
            analyzer: None,
            settings,
        }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<ContentAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn register(mut self, scraper: Arc<dyn Scraper>) -> anyhow::Result<Self> {
        let name = scraper.name().to_string();
        if self.scrapers.contains_key(&name) {
            bail!("scraper already registered: {name}");
        }
        self.scrapers.insert(name, scraper);
        Ok(self)
    }

    pub fn register_all(
        mut self,
        scrapers: impl IntoIterator<Item = Arc<dyn Scraper>>,
    ) -> anyhow::Result<Self> {
        for s in scrapers {
            self = self.register(s)?;
        }
        Ok(self)
    }

    pub fn build(self) -> ScraperManager {
        tracing::info!(
            sources = ?self.scrapers.keys().collect::<Vec<_>>(),
            "scraper registry built"
        );
        ScraperManager {
            scrapers: self.scrapers,
            analyzer: self.analyzer,
            settings: self.settings,
        }
    }
}

/// Immutable after construction; share it behind an `Arc`.
pub struct ScraperManager {
    scrapers: BTreeMap<String, Arc<dyn Scraper>>,
    analyzer: Option<Arc<ContentAnalyzer>>,
    settings: ManagerSettings,
}

impl ScraperManager {
    pub fn builder(settings: ManagerSettings) -> ScraperManagerBuilder {
        ScraperManagerBuilder::new(settings)
    }

    pub fn settings(&self) -> ManagerSettings {
        self.settings
    }

    pub fn list_sources(&self) -> Vec<SourceRegistration> {
        self.scrapers
            .values()
            .map(|s| s.registration().clone())
            .collect()
    }

    pub fn contains(&self, source: &str) -> bool {
        self.scrapers.contains_key(source)
    }

    /// Scrape one registered source. Fails with `NotFound` for unknown names.
    pub async fn scrape_one(
        &self,
        source: &str,
        query: Option<&str>,
    ) -> Result<Vec<ScrapedArticle>, ScrapeError> {
        let scraper = self
            .scrapers
            .get(source)
            .ok_or_else(|| ScrapeError::NotFound(source.to_string()))?;
        self.run_source(scraper.as_ref(), query).await
    }

    /// Scrape every source concurrently. Never fails: each source's error is
    /// reported in its own slot, and sources still running at the overall
    /// deadline are abandoned and reported as timeouts.
    pub async fn scrape_all(&self, query: Option<&str>) -> ScrapeReport {
        let t0 = Instant::now();
        counter!("scrape_runs_total").increment(1);

        let mut sources: BTreeMap<String, SourceOutcome> = BTreeMap::new();
        {
            // Owned name/scraper per task so the stream future stays `Send`.
            let jobs: Vec<_> = self
                .scrapers
                .iter()
                .map(|(name, scraper)| {
                    let name = name.clone();
                    let scraper = Arc::clone(scraper);
                    async move {
                        let res = self.run_source(scraper.as_ref(), query).await;
                        (name, SourceOutcome::from(res))
                    }
                })
                .collect();
            let mut tasks =
                pin!(stream::iter(jobs).buffer_unordered(self.settings.max_concurrency.max(1)));

            let deadline = tokio::time::Instant::now() + self.settings.overall_timeout;
            loop {
                match tokio::time::timeout_at(deadline, tasks.next()).await {
                    Ok(Some((name, outcome))) => {
                        sources.insert(name, outcome);
                    }
                    Ok(None) => break,
                    Err(_) => {
                        tracing::warn!(
                            finished = sources.len(),
                            total = self.scrapers.len(),
                            "scrape_all deadline reached; abandoning remaining sources"
                        );
                        break;
                    }
                }
            }
        }

        for name in self.scrapers.keys() {
            if !sources.contains_key(name) {
                counter!("scrape_source_errors_total", "source" => name.clone()).increment(1);
                sources.insert(
                    name.clone(),
                    SourceOutcome::from(Err(ScrapeError::timeout(
                        name,
                        self.settings.overall_timeout,
                    ))),
                );
            }
        }

        let report = ScrapeReport {
            query: query.map(str::to_string),
            sources,
            elapsed_ms: t0.elapsed().as_millis() as u64,
        };
        tracing::info!(
            articles = report.article_count(),
            failed = ?report.failed_sources(),
            elapsed_ms = report.elapsed_ms,
            "scrape_all finished"
        );
        report
    }

    async fn run_source(
        &self,
        scraper: &dyn Scraper,
        query: Option<&str>,
    ) -> Result<Vec<ScrapedArticle>, ScrapeError> {
        let name = scraper.name();
        tracing::info!(source = name, query = ?query, "running scraper");

        let res = match tokio::time::timeout(self.settings.source_timeout, scraper.scrape(query)).await
        {
            Ok(r) => r,
            Err(_) => Err(ScrapeError::timeout(name, self.settings.source_timeout)),
        };

        match res {
            Ok(articles) => {
                tracing::info!(source = name, count = articles.len(), "scraper finished");
                Ok(self.enrich(articles))
            }
            Err(e) => {
                tracing::warn!(source = name, error = %e, "scraper failed");
                counter!("scrape_source_errors_total", "source" => name.to_string()).increment(1);
                Err(e)
            }
        }
    }

    fn enrich(&self, articles: Vec<ScrapedArticle>) -> Vec<ScrapedArticle> {
        let Some(analyzer) = &self.analyzer else {
            return articles;
        };
        articles
            .into_iter()
            .map(|a| {
                let analysis = analyzer.analyze(&format!("{} {}", a.title, a.text));
                a.with_analysis(analysis)
            })
            .collect()
    }
}
