// src/research/mod.rs
//! Research agent built on the scraper registry and the LLM client.

pub mod agent;
pub mod memory;
pub mod tool;

pub use agent::{
    Agent, AgentState, ResearchAgent, ResearchAnalysis, ResearchError, ResearchResult,
    DEFAULT_MAX_RESULTS,
};
pub use memory::{Memory, MemoryItem};
pub use tool::{NewsSearchTool, SearchHit, Tool, ToolParameter, ToolResult, SEARCH_TOOL};
