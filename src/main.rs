//! AI Automation Tracker - binary entrypoint.
//! Boots the Axum HTTP server with shared state, tracing and Prometheus metrics.

use automation_tracker::config::AppConfig;
use automation_tracker::telemetry::{init_tracing, Metrics};
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::from_env();
    let state = automation_tracker::build_state(&cfg)?;
    tracing::info!(
        sources = state.scrapers.list_sources().len(),
        llm_provider = %cfg.llm.provider,
        "automation tracker starting"
    );

    let metrics = Metrics::init()?;
    let router = automation_tracker::create_router(state).merge(metrics.router());

    Ok(router.into())
}
