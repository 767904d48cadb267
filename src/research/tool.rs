// src/research/tool.rs
//! Tools the research agent can invoke by name.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::scrape::{ScrapedArticle, ScraperManager};

#[derive(Debug, Clone, Serialize)]
pub struct ToolParameter {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub description: &'static str,
    pub required: bool,
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: Value,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(output: Value) -> Self {
        Self {
            success: true,
            output,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: Value::Null,
            error: Some(error.into()),
        }
    }
}

/// A named capability with JSON parameters. Failures are reported in the
/// returned `ToolResult`, never raised.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Vec<ToolParameter>;

    async fn execute(&self, params: Value) -> ToolResult;

    /// JSON-schema style description for prompts and `/research/tools`.
    fn schema(&self) -> Value {
        let params = self.parameters();
        let properties: serde_json::Map<String, Value> = params
            .iter()
            .map(|p| {
                (
                    p.name.to_string(),
                    json!({"type": p.kind, "description": p.description, "default": p.default}),
                )
            })
            .collect();
        let required: Vec<&str> = params.iter().filter(|p| p.required).map(|p| p.name).collect();
        json!({
            "name": self.name(),
            "description": self.description(),
            "parameters": {"type": "object", "properties": properties, "required": required}
        })
    }
}

/// Search hit handed back to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub source: String,
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub technologies: Vec<String>,
}

const SNIPPET_CHARS: usize = 400;

impl From<&ScrapedArticle> for SearchHit {
    fn from(a: &ScrapedArticle) -> Self {
        let body = a.summary.as_deref().unwrap_or(&a.text);
        Self {
            title: a.title.clone(),
            url: a.url.clone(),
            snippet: body.chars().take(SNIPPET_CHARS).collect(),
            source: a.source.clone(),
            published_at: a.published_at,
            technologies: a.technologies.clone(),
        }
    }
}

pub const SEARCH_TOOL: &str = "search_news";

/// Searches every registered scraper source.
///
/// Params: `query` (string, optional; absent means latest news) and
/// `num_results` (integer, default 5). Output: `{query, results, result_count}`.
pub struct NewsSearchTool {
    scrapers: Arc<ScraperManager>,
}

impl NewsSearchTool {
    pub fn new(scrapers: Arc<ScraperManager>) -> Self {
        Self { scrapers }
    }
}

#[async_trait]
impl Tool for NewsSearchTool {
    fn name(&self) -> &str {
        SEARCH_TOOL
    }

    fn description(&self) -> &str {
        "Search the registered news sources for articles on a topic"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter {
                name: "query",
                kind: "string",
                description: "Text the article title or body must match",
                required: false,
                default: None,
            },
            ToolParameter {
                name: "num_results",
                kind: "integer",
                description: "Maximum number of results (default: 5)",
                required: false,
                default: Some(json!(5)),
            },
        ]
    }

    async fn execute(&self, params: Value) -> ToolResult {
        let query = match params.get("query") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.as_str()),
            Some(other) => return ToolResult::failed(format!("query must be a string, got {other}")),
        };
        let num_results = match params.get("num_results") {
            None | Some(Value::Null) => 5,
            Some(v) => match v.as_u64() {
                Some(n) => n as usize,
                None => return ToolResult::failed(format!("num_results must be a non-negative integer, got {v}")),
            },
        };

        let report = self.scrapers.scrape_all(query).await;
        let hits: Vec<SearchHit> = report
            .merged_newest_first()
            .iter()
            .take(num_results)
            .map(SearchHit::from)
            .collect();

        tracing::debug!(query = ?query, hits = hits.len(), failed = ?report.failed_sources(), "news search");
        ToolResult::ok(json!({
            "query": query,
            "result_count": hits.len(),
            "results": hits,
            "failed_sources": report.failed_sources(),
        }))
    }
}
