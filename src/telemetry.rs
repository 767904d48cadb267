// src/telemetry.rs
//! Logging and Prometheus metrics setup.

use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "automation_tracker=info,warn";

/// Install the global subscriber. `LOG_FORMAT=json` switches to JSON lines.
/// Calling it twice is harmless; the second call is ignored.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_current_span(false))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. Only one recorder may exist per process.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe();
        Ok(Self { handle })
    }

    /// Router exposing `/metrics` in the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    describe_counter!("scrape_runs_total", "scrape_all invocations");
    describe_counter!("scrape_articles_total", "articles returned per source");
    describe_counter!("scrape_source_errors_total", "failed source scrapes");
    describe_counter!("scrape_requests_total", "outbound scraper HTTP requests");
    describe_histogram!("scrape_fetch_ms", "outbound scraper request latency (ms)");
    describe_counter!("llm_requests_total", "LLM provider calls");
    describe_counter!("llm_cache_hits_total", "LLM responses served from cache");
    describe_counter!("records_created_total", "automation records stored");
    describe_counter!("research_runs_total", "research agent runs");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_twice_is_fine() {
        init_tracing();
        init_tracing();
    }
}
