// src/research/agent.rs
//! Research agent: gathers articles through its tools, asks the LLM for an
//! analysis, and logs what it did to its memory.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ErrorKind;
use crate::llm::{ChatMessage, GenerateOptions, LlmClient, LlmError};
use crate::research::memory::{Memory, MemoryItem};
use crate::research::tool::{NewsSearchTool, SearchHit, Tool, ToolResult, SEARCH_TOOL};
use crate::scrape::ScraperManager;

pub const DEFAULT_MAX_RESULTS: usize = 5;
pub const MAX_RESULTS_CAP: usize = 50;
pub const MAX_LOOKBACK_DAYS: u32 = 365;

const AGENT_NAME: &str = "AI Research Agent";
const AGENT_ROLE: &str = "Finds and analyzes the latest news about AI in software \
engineering automation: tools, frameworks and methodologies changing how software is built.";
const ANALYST_SYSTEM: &str = "You are an expert AI research analyst. Analyze search results \
about AI in software engineering automation and extract key insights, trends and important \
information. Be concise but thorough.";
const TRENDS_TOPIC: &str = "emerging trends in AI for software engineering automation";
const NO_RESULTS_SUMMARY: &str = "No relevant information found.";
const FAILED_SUMMARY: &str = "Error analyzing search results.";

static KEY_POINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:\d+[.)]|[•*-])\s+(.+?)\s*$").expect("static key point regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    Idle,
    Thinking,
    Acting,
    Error,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ResearchError {
    #[error("invalid research request: {0}")]
    Validation(String),
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),
    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

impl ResearchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResearchError::Validation(_) => ErrorKind::ValidationError,
            ResearchError::DuplicateTool(_) => ErrorKind::Internal,
            ResearchError::UnknownTool(_) => ErrorKind::NotFound,
        }
    }
}

/// Tool registry + memory + LLM access. Specialised agents build on this.
pub struct Agent {
    name: String,
    role: String,
    state: Mutex<AgentState>,
    memory: Mutex<Memory>,
    tools: BTreeMap<String, Arc<dyn Tool>>,
    llm: Arc<LlmClient>,
}

impl Agent {
    pub fn new(name: impl Into<String>, role: impl Into<String>, llm: Arc<LlmClient>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            state: Mutex::new(AgentState::Idle),
            memory: Mutex::new(Memory::default()),
            tools: BTreeMap::new(),
            llm,
        }
    }

    pub fn with_memory(mut self, memory: Memory) -> Self {
        self.memory = Mutex::new(memory);
        self
    }

    pub fn add_tool(&mut self, tool: Arc<dyn Tool>) -> Result<(), ResearchError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ResearchError::DuplicateTool(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn tool(&self, name: &str) -> Result<&Arc<dyn Tool>, ResearchError> {
        self.tools
            .get(name)
            .ok_or_else(|| ResearchError::UnknownTool(name.to_string()))
    }

    pub fn tool_schemas(&self) -> Vec<Value> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn state(&self) -> AgentState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_state(&self, state: AgentState) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = state;
    }

    pub fn observe(&self, source: &str, content: impl Into<String>, metadata: Value) {
        let content = content.into();
        tracing::info!(agent = %self.name, source, content = %content, "observation");
        self.memory
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .add_observation(content, metadata);
    }

    pub fn recall(&self, query: &str, limit: usize) -> Vec<MemoryItem> {
        self.memory
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .relevant(query, limit)
    }

    pub fn memory_snapshot(&self) -> Memory {
        self.memory.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Run a registered tool. An unknown tool is a failed `ToolResult`.
    pub async fn act(&self, action: &str, params: Value) -> ToolResult {
        self.set_state(AgentState::Acting);
        let result = match self.tool(action) {
            Ok(tool) => tool.execute(params.clone()).await,
            Err(e) => ToolResult::failed(e.to_string()),
        };
        if let Some(err) = &result.error {
            tracing::warn!(agent = %self.name, action, error = %err, "tool failed");
        }
        self.observe(
            "action_result",
            format!("Executed {action}"),
            json!({
                "action": action,
                "parameters": params,
                "success": result.success,
                "error": result.error,
            }),
        );
        self.set_state(AgentState::Idle);
        result
    }

    pub async fn llm_generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        opts: &GenerateOptions,
    ) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));
        let resp = self.llm.generate_async(&messages, opts).await?;
        Ok(resp.content)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResearchAnalysis {
    pub summary: String,
    pub key_points: Vec<String>,
    pub analysis_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResearchResult {
    pub topic: String,
    pub search_date: DateTime<Utc>,
    /// Number of search tool invocations, including the broad fallback.
    pub searches: usize,
    pub results_found: usize,
    pub results: Vec<SearchHit>,
    pub analysis: ResearchAnalysis,
}

pub struct ResearchAgent {
    agent: Agent,
}

impl ResearchAgent {
    pub fn new(scrapers: Arc<ScraperManager>, llm: Arc<LlmClient>) -> Self {
        let mut agent = Agent::new(AGENT_NAME, AGENT_ROLE, llm);
        agent
            .tools
            .insert(SEARCH_TOOL.to_string(), Arc::new(NewsSearchTool::new(scrapers)));
        tracing::info!(agent = AGENT_NAME, "research agent ready");
        Self { agent }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn agent_mut(&mut self) -> &mut Agent {
        &mut self.agent
    }

    pub async fn research_topic(
        &self,
        topic: &str,
        max_results: usize,
    ) -> Result<ResearchResult, ResearchError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ResearchError::Validation("topic must not be empty".into()));
        }
        check_max_results(max_results)?;
        Ok(self
            .research(topic, vec![Some(topic.to_string())], max_results, None)
            .await)
    }

    pub async fn compare_tools(&self, tool_names: &[String]) -> Result<ResearchResult, ResearchError> {
        let names: Vec<String> = tool_names
            .iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        if names.is_empty() {
            return Err(ResearchError::Validation(
                "no tools provided for comparison".into(),
            ));
        }
        let topic = format!(
            "compare {} for software engineering automation",
            names.join(" vs ")
        );
        let queries = names.into_iter().map(Some).collect();
        Ok(self.research(&topic, queries, DEFAULT_MAX_RESULTS, None).await)
    }

    pub async fn research_trends(&self) -> ResearchResult {
        let queries = vec![Some("trend".to_string()), Some("automation".to_string())];
        self.research(TRENDS_TOPIC, queries, DEFAULT_MAX_RESULTS, None)
            .await
    }

    /// Latest news, restricted to articles published within `days`.
    pub async fn latest_developments(&self, days: u32) -> Result<ResearchResult, ResearchError> {
        if days == 0 || days > MAX_LOOKBACK_DAYS {
            return Err(ResearchError::Validation(format!(
                "days must be within 1..={MAX_LOOKBACK_DAYS}, got {days}"
            )));
        }
        let topic = format!(
            "latest developments in AI for software engineering automation in the last {days} days"
        );
        let since = Utc::now() - Duration::days(i64::from(days));
        Ok(self
            .research(&topic, vec![None], DEFAULT_MAX_RESULTS, Some(since))
            .await)
    }

    async fn research(
        &self,
        topic: &str,
        queries: Vec<Option<String>>,
        max_results: usize,
        since: Option<DateTime<Utc>>,
    ) -> ResearchResult {
        self.agent.set_state(AgentState::Thinking);
        counter!("research_runs_total").increment(1);
        tracing::info!(topic, queries = ?queries, "starting research");

        let mut hits = Vec::new();
        let mut searches = 0;
        for q in &queries {
            searches += 1;
            hits.extend(self.search(q.as_deref(), max_results, since).await);
        }
        // Nothing matched the targeted queries: fall back to one broad pass.
        if hits.is_empty() && queries.iter().any(Option::is_some) {
            searches += 1;
            hits = self.search(None, max_results, since).await;
        }

        let mut seen = HashSet::new();
        let results: Vec<SearchHit> = hits
            .into_iter()
            .filter(|h| !h.url.is_empty() && seen.insert(h.url.clone()))
            .take(max_results)
            .collect();

        self.agent.set_state(AgentState::Thinking);
        let analysis = self.analyze(&results, topic).await;
        let summary_head: String = analysis.summary.chars().take(200).collect();
        self.agent.observe(
            "research",
            format!("Completed research on {topic}"),
            json!({"topic": topic, "results_summary": summary_head}),
        );
        self.agent.set_state(if analysis.error.is_some() {
            AgentState::Error
        } else {
            AgentState::Idle
        });

        ResearchResult {
            topic: topic.to_string(),
            search_date: Utc::now(),
            searches,
            results_found: results.len(),
            results,
            analysis,
        }
    }

    async fn search(
        &self,
        query: Option<&str>,
        max_results: usize,
        since: Option<DateTime<Utc>>,
    ) -> Vec<SearchHit> {
        let res = self
            .agent
            .act(
                SEARCH_TOOL,
                json!({"query": query, "num_results": max_results * 2}),
            )
            .await;
        if !res.success {
            return Vec::new();
        }
        let hits: Vec<SearchHit> = match serde_json::from_value(res.output["results"].clone()) {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!(error = %e, "unexpected search tool output");
                return Vec::new();
            }
        };
        match since {
            Some(since) => hits
                .into_iter()
                .filter(|h| h.published_at.is_some_and(|p| p >= since))
                .collect(),
            None => hits,
        }
    }

    async fn analyze(&self, results: &[SearchHit], topic: &str) -> ResearchAnalysis {
        if results.is_empty() {
            return ResearchAnalysis {
                summary: NO_RESULTS_SUMMARY.to_string(),
                key_points: Vec::new(),
                analysis_date: Utc::now(),
                error: None,
            };
        }

        let opts = GenerateOptions {
            temperature: Some(0.7),
            max_tokens: Some(1000),
            ..Default::default()
        };
        match self
            .agent
            .llm_generate(&analysis_prompt(topic, results), Some(ANALYST_SYSTEM), &opts)
            .await
        {
            Ok(text) => ResearchAnalysis {
                key_points: extract_key_points(&text),
                summary: text,
                analysis_date: Utc::now(),
                error: None,
            },
            Err(e) => {
                tracing::error!(topic, error = %e, "research analysis failed");
                ResearchAnalysis {
                    summary: FAILED_SUMMARY.to_string(),
                    key_points: Vec::new(),
                    analysis_date: Utc::now(),
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

fn check_max_results(n: usize) -> Result<(), ResearchError> {
    if n == 0 || n > MAX_RESULTS_CAP {
        return Err(ResearchError::Validation(format!(
            "max_results must be within 1..={MAX_RESULTS_CAP}, got {n}"
        )));
    }
    Ok(())
}

pub fn analysis_prompt(topic: &str, results: &[SearchHit]) -> String {
    let sources = results
        .iter()
        .map(|r| format!("Source: {} ({})\nSnippet: {}", r.title, r.url, r.snippet))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Analyze the following search results about '{topic}' in the context of AI in \
software engineering automation. Provide:\n\n\
1. A 2-3 paragraph summary of the current state of this topic\n\
2. 3-5 key points or trends\n\
3. Any notable tools, frameworks, or companies mentioned\n\
4. Potential implications for software engineering\n\n\
Search Results:\n{sources}"
    )
}

/// Numbered or bulleted lines of an LLM answer.
pub fn extract_key_points(text: &str) -> Vec<String> {
    KEY_POINT
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
