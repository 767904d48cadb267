// src/scrape/fetch.rs
//! Shared outbound GET used by every source scraper.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use metrics::{counter, histogram};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};

use crate::scrape::rate_limiter::RateLimiter;
use crate::scrape::types::ScrapeError;

pub const DEFAULT_USER_AGENT: &str =
    "automation-tracker/0.1 (+https://github.com/automation-tracker/automation-tracker)";

#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(limiter: Arc<RateLimiter>, timeout: Duration) -> anyhow::Result<Self> {
        Self::with_user_agent(limiter, timeout, DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(
        limiter: Arc<RateLimiter>,
        timeout: Duration,
        user_agent: &str,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .context("building scraper http client")?;
        Ok(Self {
            client,
            limiter,
            timeout,
        })
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET `url` on behalf of `source`, waiting on the source's rate limit first.
    /// Non-2xx statuses, transport errors and upstream timeouts become
    /// `ScrapeError::Retrieval`.
    pub async fn get_text(&self, source: &str, url: &str) -> Result<String, ScrapeError> {
        self.limiter.wait_if_needed(source).await;

        let t0 = Instant::now();
        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .header(
                ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.5")
            .send()
            .await
            .map_err(|e| self.map_transport_error(source, url, e))?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(source, url, %status, "upstream returned non-success status");
            return Err(ScrapeError::retrieval(
                source,
                format!("HTTP {status} for {url}"),
            ));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| self.map_transport_error(source, url, e))?;

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("scrape_fetch_ms").record(ms);
        counter!("scrape_requests_total", "source" => source.to_string()).increment(1);
        tracing::debug!(source, url, bytes = body.len(), ms, "fetched");
        Ok(body)
    }

    fn map_transport_error(&self, source: &str, url: &str, e: reqwest::Error) -> ScrapeError {
        tracing::warn!(error = ?e, source, url, "scraper http error");
        if e.is_timeout() {
            ScrapeError::retrieval(
                source,
                format!(
                    "request to {url} timed out after {:.1}s",
                    self.timeout.as_secs_f64()
                ),
            )
        } else {
            ScrapeError::retrieval(source, format!("request to {url} failed: {e}"))
        }
    }
}
