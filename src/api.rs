// src/api.rs
//! HTTP surface. Handlers are thin: parse, call into the subsystem, map errors.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::error::ApiError;
use crate::llm::{ChatMessage, GenerateOptions, LlmClient, LlmResponse};
use crate::research::{AgentState, MemoryItem, ResearchAgent, ResearchResult, DEFAULT_MAX_RESULTS};
use crate::scrape::{ScrapeReport, ScrapedArticle, ScraperManager, SourceRegistration};
use crate::tracker::{
    analytics, AutomationRecord, DailyUsage, NewAutomationRecord, RecordStore, ToolUsage,
    TotalTime, UsageReport,
};

#[derive(Clone)]
pub struct AppState {
    pub scrapers: Arc<ScraperManager>,
    pub llm: Arc<LlmClient>,
    pub records: Arc<dyn RecordStore>,
    pub research: Arc<ResearchAgent>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(|| async { "OK" }))
        .route("/record/automation", post(create_record))
        .route("/record/automation/{id}", get(get_record))
        .route("/analytics/total-time", get(total_time))
        .route("/analytics/tools-usage", get(tools_usage))
        .route("/analytics/usage-by-date", get(usage_by_date))
        .route("/analytics/generate-report", get(generate_report))
        .route("/scrape", get(scrape_all))
        .route("/sources", get(list_sources))
        .route("/scrape/{source}", get(scrape_source))
        .route("/llm/generate", post(llm_generate))
        .route("/research", post(research_topic))
        .route("/research/compare", post(compare_tools))
        .route("/research/trends", get(research_trends))
        .route("/research/latest", get(latest_developments))
        .route("/research/memory", get(research_memory))
        .route("/research/tools", get(research_tools))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "AI Automation Tracker API",
        "endpoints": {
            "record": "/record/automation",
            "analytics": [
                "/analytics/total-time",
                "/analytics/tools-usage",
                "/analytics/usage-by-date",
                "/analytics/generate-report"
            ],
            "scrape": "/scrape",
            "sources": "/sources",
            "scrape_source": "/scrape/{source}",
            "llm": "/llm/generate",
            "research": [
                "/research",
                "/research/compare",
                "/research/trends",
                "/research/latest",
                "/research/memory",
                "/research/tools"
            ]
        }
    }))
}

// ---------- records & analytics ----------

async fn create_record(
    State(state): State<AppState>,
    body: Result<Json<NewAutomationRecord>, JsonRejection>,
) -> Result<(StatusCode, Json<AutomationRecord>), ApiError> {
    let Json(new) = body.map_err(|e| ApiError::validation(e.body_text()))?;
    let record = state.records.insert(new).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn get_record(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<AutomationRecord>, ApiError> {
    let Path(id) = id.map_err(|e| ApiError::validation(e.body_text()))?;
    Ok(Json(state.records.get(id).await?))
}

#[derive(Debug, Default, Deserialize)]
struct EngineerFilter {
    #[serde(default)]
    engineer_id: Option<String>,
}

impl EngineerFilter {
    fn engineer(&self) -> Option<&str> {
        self.engineer_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

async fn load_records(
    state: &AppState,
    filter: Result<Query<EngineerFilter>, QueryRejection>,
) -> Result<(EngineerFilter, Vec<AutomationRecord>), ApiError> {
    let Query(filter) = filter.map_err(|e| ApiError::validation(e.body_text()))?;
    let records = state.records.list(filter.engineer()).await?;
    Ok((filter, records))
}

async fn total_time(
    State(state): State<AppState>,
    q: Result<Query<EngineerFilter>, QueryRejection>,
) -> Result<Json<TotalTime>, ApiError> {
    let (filter, records) = load_records(&state, q).await?;
    Ok(Json(analytics::total_time(filter.engineer(), &records)))
}

async fn tools_usage(
    State(state): State<AppState>,
    q: Result<Query<EngineerFilter>, QueryRejection>,
) -> Result<Json<Vec<ToolUsage>>, ApiError> {
    let (_, records) = load_records(&state, q).await?;
    Ok(Json(analytics::tools_usage(&records)))
}

async fn usage_by_date(
    State(state): State<AppState>,
    q: Result<Query<EngineerFilter>, QueryRejection>,
) -> Result<Json<Vec<DailyUsage>>, ApiError> {
    let (_, records) = load_records(&state, q).await?;
    Ok(Json(analytics::usage_by_date(&records)))
}

async fn generate_report(
    State(state): State<AppState>,
    q: Result<Query<EngineerFilter>, QueryRejection>,
) -> Result<Json<UsageReport>, ApiError> {
    let (filter, records) = load_records(&state, q).await?;
    Ok(Json(analytics::generate_report(filter.engineer(), &records)))
}

// ---------- scraping ----------

#[derive(Debug, Default, Deserialize)]
struct ScrapeParams {
    #[serde(default)]
    query: Option<String>,
}

impl ScrapeParams {
    fn query(&self) -> Option<&str> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

async fn scrape_all(
    State(state): State<AppState>,
    params: Result<Query<ScrapeParams>, QueryRejection>,
) -> Result<Json<ScrapeReport>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::validation(e.body_text()))?;
    Ok(Json(state.scrapers.scrape_all(params.query()).await))
}

#[derive(Serialize)]
struct SourcesResp {
    sources: Vec<SourceRegistration>,
}

async fn list_sources(State(state): State<AppState>) -> Json<SourcesResp> {
    Json(SourcesResp {
        sources: state.scrapers.list_sources(),
    })
}

async fn scrape_source(
    State(state): State<AppState>,
    source: Result<Path<String>, PathRejection>,
    params: Result<Query<ScrapeParams>, QueryRejection>,
) -> Result<Json<Vec<ScrapedArticle>>, ApiError> {
    let Path(source) = source.map_err(|e| ApiError::validation(e.body_text()))?;
    let Query(params) = params.map_err(|e| ApiError::validation(e.body_text()))?;
    let articles = state.scrapers.scrape_one(&source, params.query()).await?;
    Ok(Json(articles))
}

// ---------- llm ----------

#[derive(Debug, Deserialize)]
struct GenerateReq {
    #[serde(default)]
    messages: Vec<ChatMessage>,
    /// Shorthand for a single user message.
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    system: Option<String>,
    #[serde(flatten)]
    options: GenerateOptions,
}

async fn llm_generate(
    State(state): State<AppState>,
    body: Result<Json<GenerateReq>, JsonRejection>,
) -> Result<Json<LlmResponse>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::validation(e.body_text()))?;

    let mut messages = Vec::with_capacity(req.messages.len() + 2);
    if let Some(system) = req.system {
        messages.push(ChatMessage::system(system));
    }
    messages.extend(req.messages);
    if let Some(prompt) = req.prompt {
        messages.push(ChatMessage::user(prompt));
    }

    let resp = state.llm.generate_async(&messages, &req.options).await?;
    Ok(Json(resp))
}

// ---------- research ----------

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

#[derive(Debug, Deserialize)]
struct ResearchReq {
    topic: String,
    #[serde(default = "default_max_results")]
    max_results: usize,
}

async fn research_topic(
    State(state): State<AppState>,
    body: Result<Json<ResearchReq>, JsonRejection>,
) -> Result<Json<ResearchResult>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::validation(e.body_text()))?;
    let result = state
        .research
        .research_topic(&req.topic, req.max_results)
        .await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
struct CompareReq {
    tools: Vec<String>,
}

async fn compare_tools(
    State(state): State<AppState>,
    body: Result<Json<CompareReq>, JsonRejection>,
) -> Result<Json<ResearchResult>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::validation(e.body_text()))?;
    Ok(Json(state.research.compare_tools(&req.tools).await?))
}

async fn research_trends(State(state): State<AppState>) -> Json<ResearchResult> {
    Json(state.research.research_trends().await)
}

#[derive(Debug, Deserialize)]
struct LatestParams {
    #[serde(default = "default_days")]
    days: u32,
}

fn default_days() -> u32 {
    7
}

async fn latest_developments(
    State(state): State<AppState>,
    params: Result<Query<LatestParams>, QueryRejection>,
) -> Result<Json<ResearchResult>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::validation(e.body_text()))?;
    Ok(Json(state.research.latest_developments(params.days).await?))
}

#[derive(Debug, Deserialize)]
struct MemoryParams {
    #[serde(default)]
    query: Option<String>,
    #[serde(default = "default_memory_limit")]
    limit: usize,
}

fn default_memory_limit() -> usize {
    20
}

#[derive(Serialize)]
struct MemoryResp {
    agent: String,
    state: AgentState,
    short_term: usize,
    long_term: usize,
    items: Vec<MemoryItem>,
}

async fn research_memory(
    State(state): State<AppState>,
    params: Result<Query<MemoryParams>, QueryRejection>,
) -> Result<Json<MemoryResp>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::validation(e.body_text()))?;
    let agent = state.research.agent();
    let memory = agent.memory_snapshot();
    Ok(Json(MemoryResp {
        agent: agent.name().to_string(),
        state: agent.state(),
        short_term: memory.short_term_len(),
        long_term: memory.long_term_len(),
        items: agent.recall(params.query.as_deref().unwrap_or(""), params.limit),
    }))
}

async fn research_tools(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "tools": state.research.agent().tool_schemas() }))
}
