// src/scrape/types.rs
use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyze::Analysis;
use crate::error::ErrorKind;

/// One normalized article produced by a source scraper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrapedArticle {
    pub source: String, // registered source name, e.g. "tech_news"
    pub url: String,
    pub title: String,
    pub published_at: Option<DateTime<Utc>>,
    pub text: String, // normalized plain text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    pub impact_score: Option<f32>,
    #[serde(default)]
    pub job_impact: BTreeMap<String, Vec<String>>,
}

impl ScrapedArticle {
    pub fn new(
        source: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            url: url.into(),
            title: title.into(),
            published_at: None,
            text: text.into(),
            summary: None,
            authors: Vec::new(),
            technologies: Vec::new(),
            impact_score: None,
            job_impact: BTreeMap::new(),
        }
    }

    pub fn published(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.published_at = at;
        self
    }

    /// Returns a copy carrying the analyzer's findings.
    pub fn with_analysis(mut self, analysis: Analysis) -> Self {
        self.technologies = analysis.technologies;
        self.impact_score = Some(analysis.impact_score);
        self.job_impact = analysis.job_impact;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Rss,
    Html,
}

/// Static description of a registered source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRegistration {
    pub name: String,
    pub kind: SourceKind,
    pub base_url: String,
    /// Minimum seconds between two requests to this source.
    pub rate_limit: f64,
}

impl SourceRegistration {
    pub fn new(
        name: impl Into<String>,
        kind: SourceKind,
        base_url: impl Into<String>,
        rate_limit: f64,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            base_url: base_url.into(),
            rate_limit,
        }
    }

    pub fn min_interval(&self) -> Duration {
        if self.rate_limit.is_finite() && self.rate_limit > 0.0 {
            Duration::from_secs_f64(self.rate_limit)
        } else {
            Duration::ZERO
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ScrapeError {
    #[error("unknown source: {0}")]
    NotFound(String),
    #[error("retrieval failed for {source_name}: {message}")]
    Retrieval {
        source_name: String,
        message: String,
    },
    /// Raised by the manager's own per-source and overall bounds.
    #[error("{source_name} timed out after {secs:.1}s")]
    Timeout { source_name: String, secs: f64 },
}

impl ScrapeError {
    pub fn retrieval(source_name: &str, message: impl Into<String>) -> Self {
        Self::Retrieval {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }

    pub fn timeout(source_name: &str, after: Duration) -> Self {
        Self::Timeout {
            source_name: source_name.to_string(),
            secs: after.as_secs_f64(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ScrapeError::NotFound(_) => ErrorKind::NotFound,
            ScrapeError::Retrieval { .. } => ErrorKind::RetrievalFailure,
            ScrapeError::Timeout { .. } => ErrorKind::Timeout,
        }
    }
}

/// Capability every source-specific scraper implements.
///
/// Implementations consult the shared rate limiter before each outbound request,
/// return an empty list when nothing matches, and fail with `Retrieval`
/// (never panic) when the upstream cannot be reached in time or answers non-2xx.
#[async_trait]
pub trait Scraper: Send + Sync {
    fn registration(&self) -> &SourceRegistration;

    fn name(&self) -> &str {
        &self.registration().name
    }

    async fn scrape(&self, query: Option<&str>) -> Result<Vec<ScrapedArticle>, ScrapeError>;
}
