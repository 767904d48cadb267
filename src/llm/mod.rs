// src/llm/mod.rs
//! LLM adapter: one client over several chat-completion providers, with a TTL cache.

pub mod cache;
pub mod client;
pub mod providers;
pub mod types;

pub use cache::ResponseCache;
pub use client::LlmClient;
pub use providers::{AnthropicProvider, MockProvider, OpenAiCompatProvider, Provider};
pub use types::{
    ChatMessage, GenerateOptions, LlmError, LlmResponse, ProviderKind, ResolvedOptions, Usage,
};
