// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod api;
pub mod config;
pub mod error;
pub mod llm;
pub mod research;
pub mod scrape;
pub mod telemetry;
pub mod tracker;

use std::sync::Arc;

use anyhow::Context;

use crate::analyze::ContentAnalyzer;
use crate::config::AppConfig;
use crate::llm::LlmClient;
use crate::research::ResearchAgent;
use crate::scrape::config::{build_scrapers, load_sources_default, SourceDef};
use crate::scrape::fetch::Fetcher;
use crate::scrape::{RateLimiter, ScraperManager};
use crate::tracker::SqliteRecordStore;

pub use crate::api::{create_router, AppState};
pub use crate::error::{ApiError, ErrorKind};

/// Wire the shared state from `cfg` and an explicit list of sources.
pub fn build_state_with_sources(cfg: &AppConfig, sources: &[SourceDef]) -> anyhow::Result<AppState> {
    let limiter = Arc::new(RateLimiter::new(cfg.scraper.default_interval));
    let fetcher = Fetcher::with_user_agent(
        limiter,
        cfg.scraper.request_timeout,
        &cfg.scraper.user_agent,
    )?;
    let scrapers = build_scrapers(sources, &fetcher, cfg.scraper.query_mode)?;

    let manager = ScraperManager::builder(cfg.scraper.manager)
        .with_analyzer(Arc::new(ContentAnalyzer::from_env_or_default()))
        .register_all(scrapers)?
        .build();

    let scrapers = Arc::new(manager);
    let llm = Arc::new(LlmClient::from_config(cfg.llm.clone()).context("building llm client")?);
    let records = SqliteRecordStore::open(&cfg.database_url)
        .with_context(|| format!("opening record store at {}", cfg.database_url))?;
    let research = Arc::new(ResearchAgent::new(scrapers.clone(), llm.clone()));

    Ok(AppState {
        scrapers,
        llm,
        records: Arc::new(records),
        research,
    })
}

/// Wire the shared state, loading sources from `SCRAPER_SOURCES_PATH` or its fallbacks.
pub fn build_state(cfg: &AppConfig) -> anyhow::Result<AppState> {
    let sources = load_sources_default().context("loading scraper sources")?;
    build_state_with_sources(cfg, &sources)
}

/// Router with every API route (no `/metrics`; the binary merges that in).
pub fn app(cfg: &AppConfig) -> anyhow::Result<axum::Router> {
    Ok(create_router(build_state(cfg)?))
}
