// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health, GET /
// - POST /record/automation, GET /record/automation/{id}
// - GET /analytics/*
// - GET /sources, /scrape, /scrape/{source}
// - POST /llm/generate
// - /research routes
// - error body shape

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::json;
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use automation_tracker::analyze::ContentAnalyzer;
use automation_tracker::config::AppConfig;
use automation_tracker::llm::{LlmClient, MockProvider};
use automation_tracker::research::ResearchAgent;
use automation_tracker::scrape::providers::{RssFeedOptions, RssFeedScraper};
use automation_tracker::scrape::{ManagerSettings, Scraper, ScraperManager, SourceKind, SourceRegistration};
use automation_tracker::tracker::SqliteRecordStore;
use automation_tracker::{build_state_with_sources, create_router, AppState};

const BODY_LIMIT: usize = 1024 * 1024;
const FEED_XML: &str = include_str!("fixtures/tech_feed.xml");

/// Router over an in-memory store, a mock LLM and one fixture-backed source.
fn test_router() -> Router {
    let tech_news: Arc<dyn Scraper> = Arc::new(RssFeedScraper::from_fixture_str(
        SourceRegistration::new("tech_news", SourceKind::Rss, "https://wire.test", 2.0),
        RssFeedOptions::default(),
        FEED_XML,
    ));
    let broken: Arc<dyn Scraper> = Arc::new(RssFeedScraper::from_fixture_str(
        SourceRegistration::new("broken", SourceKind::Rss, "https://broken.test", 1.0),
        RssFeedOptions::default(),
        "not xml at all",
    ));
    let scrapers = ScraperManager::builder(ManagerSettings::default())
        .with_analyzer(Arc::new(ContentAnalyzer::default()))
        .register_all([tech_news, broken])
        .expect("unique names")
        .build();

    let cfg = AppConfig::for_tests();
    let scrapers = Arc::new(scrapers);
    let llm = Arc::new(LlmClient::with_provider(
        cfg.llm.clone(),
        Arc::new(MockProvider::new(
            "mock summary\n1. Kubernetes keeps shipping\n2. Codegen reshapes hiring",
        )),
    ));
    let state = AppState {
        research: Arc::new(ResearchAgent::new(scrapers.clone(), llm.clone())),
        scrapers,
        llm,
        records: Arc::new(SqliteRecordStore::in_memory().expect("sqlite")),
    };
    create_router(state)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Json) {
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let v = if bytes.is_empty() {
        Json::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Json::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, v)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET")
}

fn post_json(uri: &str, payload: &Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST")
}

fn record(engineer: &str, tool: &str, start: &str, end: &str) -> Json {
    json!({
        "engineer_id": engineer,
        "tool_name": tool,
        "start_time": start,
        "end_time": end,
        "description": "generated unit tests"
    })
}

#[tokio::test]
async fn health_and_root() {
    let app = test_router();

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Json::String("OK".into()));

    let (status, body) = send(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "AI Automation Tracker API");
    assert_eq!(body["endpoints"]["sources"], "/sources");
}

#[tokio::test]
async fn record_roundtrip_and_analytics() {
    let app = test_router();

    let (status, created) = send(
        &app,
        post_json(
            "/record/automation",
            &record("eng-1", "copilot", "2024-05-01T09:00:00Z", "2024-05-01T10:30:00Z"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_i64().expect("id");

    send(
        &app,
        post_json(
            "/record/automation",
            &record("eng-1", "chatgpt", "2024-05-02T09:00:00Z", "2024-05-02T09:30:00Z"),
        ),
    )
    .await;
    send(
        &app,
        post_json(
            "/record/automation",
            &record("eng-2", "copilot", "2024-05-02T11:00:00Z", "2024-05-02T12:00:00Z"),
        ),
    )
    .await;

    let (status, fetched) = send(&app, get(&format!("/record/automation/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["tool_name"], "copilot");

    let (_, total) = send(&app, get("/analytics/total-time?engineer_id=eng-1")).await;
    assert_eq!(total["total_seconds"], 2 * 3600);
    assert_eq!(total["record_count"], 2);
    assert_eq!(total["engineer_id"], "eng-1");

    let (_, tools) = send(&app, get("/analytics/tools-usage")).await;
    assert_eq!(tools[0]["tool_name"], "copilot");
    assert_eq!(tools[0]["uses"], 2);

    let (_, days) = send(&app, get("/analytics/usage-by-date?engineer_id=eng-1")).await;
    assert_eq!(days.as_array().map(Vec::len), Some(2));
    assert_eq!(days[0]["date"], "2024-05-01");

    let (status, report) = send(&app, get("/analytics/generate-report")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["top_tool"], "copilot");
    assert_eq!(report["total"]["record_count"], 3);
}

#[tokio::test]
async fn invalid_record_is_422_with_error_body() {
    let app = test_router();

    let (status, body) = send(
        &app,
        post_json(
            "/record/automation",
            &record("eng-1", "copilot", "2024-05-01T10:00:00Z", "2024-05-01T09:00:00Z"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["kind"], "VALIDATION_ERROR");

    let (status, body) = send(&app, post_json("/record/automation", &json!({"tool_name": 3}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["kind"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn missing_record_is_404() {
    let app = test_router();
    let (status, body) = send(&app, get("/record/automation/999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "NOT_FOUND");
}

#[tokio::test]
async fn sources_are_listed_with_registration() {
    let app = test_router();
    let (status, body) = send(&app, get("/sources")).await;
    assert_eq!(status, StatusCode::OK);
    let sources = body["sources"].as_array().expect("array");
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[1]["name"], "tech_news");
    assert_eq!(sources[1]["kind"], "rss");
    assert_eq!(sources[1]["rate_limit"], 2.0);
}

#[tokio::test]
async fn scrape_all_reports_partial_failure() {
    let app = test_router();
    let (status, body) = send(&app, get("/scrape?query=kubernetes")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query"], "kubernetes");
    assert_eq!(body["sources"]["broken"]["status"], "failed");
    assert_eq!(body["sources"]["broken"]["kind"], "RETRIEVAL_FAILURE");
    assert_eq!(body["sources"]["tech_news"]["status"], "ok");
    let articles = body["sources"]["tech_news"]["articles"].as_array().unwrap();
    assert_eq!(articles.len(), 1);
    assert!(articles[0]["technologies"]
        .as_array()
        .unwrap()
        .iter()
        .any(|t| t == "Kubernetes"));
}

#[tokio::test]
async fn scrape_single_source_and_errors() {
    let app = test_router();

    let (status, body) = send(&app, get("/scrape/tech_news")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(3));

    let (status, body) = send(&app, get("/scrape/unknown")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "NOT_FOUND");

    let (status, body) = send(&app, get("/scrape/broken")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["kind"], "RETRIEVAL_FAILURE");
}

#[tokio::test]
async fn llm_generate_uses_cache_and_validates() {
    let app = test_router();
    let payload = json!({
        "system": "Be brief.",
        "prompt": "Summarize AI automation news.",
        "temperature": 0.2
    });

    let (status, first) = send(&app, post_json("/llm/generate", &payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(first["content"].as_str().unwrap().starts_with("mock summary"));
    assert_eq!(first["cached"], false);

    let (_, second) = send(&app, post_json("/llm/generate", &payload)).await;
    assert_eq!(second["cached"], true);
    assert_eq!(second["content"], first["content"]);

    let (status, body) = send(
        &app,
        post_json("/llm/generate", &json!({"prompt": "x", "temperature": 3.0})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["kind"], "VALIDATION_ERROR");

    let (status, _) = send(&app, post_json("/llm/generate", &json!({}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn malformed_scrape_params_are_422_with_error_body() {
    let app = test_router();

    let (status, body) = send(&app, get("/scrape?query=a&query=b")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["kind"], "VALIDATION_ERROR");

    let (status, body) = send(&app, get("/scrape/tech_news?query=a&query=b")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["kind"], "VALIDATION_ERROR");

    let (status, body) = send(&app, get("/scrape/%FF")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["kind"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn research_topic_gathers_articles_and_analysis() {
    let app = test_router();

    let (status, body) = send(
        &app,
        post_json("/research", &json!({"topic": "kubernetes", "max_results": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["topic"], "kubernetes");
    assert_eq!(body["results_found"], 1);
    assert_eq!(body["results"][0]["title"], "Kubernetes 1.30 released");
    assert_eq!(
        body["analysis"]["key_points"],
        json!(["Kubernetes keeps shipping", "Codegen reshapes hiring"])
    );

    let (status, memory) = send(&app, get("/research/memory?query=kubernetes")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(memory["state"], "idle");
    assert_eq!(memory["items"][0]["content"], "Completed research on kubernetes");
}

#[tokio::test]
async fn research_routes_validate_input() {
    let app = test_router();

    let (status, body) = send(&app, post_json("/research", &json!({"topic": "  "}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["kind"], "VALIDATION_ERROR");

    let (status, _) = send(&app, post_json("/research/compare", &json!({"tools": []}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(&app, get("/research/latest?days=0")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, tools) = send(&app, get("/research/tools")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tools["tools"][0]["name"], "search_news");
}

#[tokio::test]
async fn compare_and_trends_return_reports() {
    let app = test_router();

    let (status, body) = send(
        &app,
        post_json("/research/compare", &json!({"tools": ["Kubernetes", "Docker"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["topic"],
        "compare Kubernetes vs Docker for software engineering automation"
    );
    assert!(body["results_found"].as_u64().unwrap() >= 1);

    let (status, body) = send(&app, get("/research/trends")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["searches"].as_u64().unwrap() >= 2);
}

#[tokio::test]
async fn state_builder_wires_an_empty_registry() {
    let cfg = AppConfig::for_tests();
    let state = build_state_with_sources(&cfg, &[]).expect("state");
    assert!(state.scrapers.list_sources().is_empty());

    let app = create_router(state);
    let (status, body) = send(&app, get("/scrape")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["sources"].as_object().unwrap().is_empty());
}
