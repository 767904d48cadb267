// src/llm/providers.rs
//! Provider backends. Each does exactly one remote call per `complete`; caching and
//! defaults live in `LlmClient`.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::llm::types::{ChatMessage, LlmError, LlmResponse, ProviderKind, ResolvedOptions, Usage};

pub type ProviderFuture<'a> =
    Pin<Box<dyn Future<Output = Result<LlmResponse, LlmError>> + Send + 'a>>;

/// Low-level provider: does a *real* remote call.
pub trait Provider: Send + Sync + 'static {
    fn complete<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        opts: &'a ResolvedOptions,
    ) -> ProviderFuture<'a>;
    fn kind(&self) -> ProviderKind;
}

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent("automation-tracker/0.1")
        .connect_timeout(timeout.min(Duration::from_secs(5)))
        .timeout(timeout)
        .build()
        .context("building llm http client")
}

fn transport_error(kind: ProviderKind, timeout: Duration, e: reqwest::Error) -> LlmError {
    tracing::warn!(error = ?e, provider = %kind, "llm http error");
    if e.is_timeout() {
        LlmError::timeout(kind, timeout)
    } else {
        LlmError::provider(kind, format!("request failed: {e}"))
    }
}

async fn ensure_success(
    kind: ProviderKind,
    resp: reqwest::Response,
) -> Result<reqwest::Response, LlmError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(200).collect();
    Err(LlmError::provider(kind, format!("HTTP {status}: {snippet}")))
}

// ------------------------------------------------------------
// OpenAI Chat Completions (also used for local OpenAI-compatible servers)
// ------------------------------------------------------------

pub struct OpenAiCompatProvider {
    kind: ProviderKind,
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    organization: Option<String>,
    timeout: Duration,
}

impl OpenAiCompatProvider {
    pub fn openai(
        api_key: Option<String>,
        organization: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            kind: ProviderKind::OpenAi,
            http: http_client(timeout)?,
            base_url: OPENAI_BASE_URL.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            organization,
            timeout,
        })
    }

    /// Local model server speaking the OpenAI protocol (e.g. llama.cpp, Ollama, vLLM).
    pub fn local(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            kind: ProviderKind::Local,
            http: http_client(timeout)?,
            base_url: base_url.into(),
            api_key: None,
            organization: None,
            timeout,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn complete_impl(
        &self,
        messages: &[ChatMessage],
        opts: &ResolvedOptions,
    ) -> Result<LlmResponse, LlmError> {
        if self.kind == ProviderKind::OpenAi && self.api_key.is_none() {
            return Err(LlmError::provider(self.kind, "OPENAI_API_KEY is not set"));
        }

        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            #[serde(default)]
            model: Option<String>,
            choices: Vec<Choice>,
            #[serde(default)]
            usage: Option<Usage>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
            #[serde(default)]
            finish_reason: Option<String>,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            #[serde(default)]
            content: Option<String>,
        }

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let mut req = self.http.post(&url).json(&Req {
            model: &opts.model,
            messages,
            temperature: opts.temperature,
            max_tokens: opts.max_tokens,
        });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        if let Some(org) = &self.organization {
            req = req.header("OpenAI-Organization", org);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| transport_error(self.kind, self.timeout, e))?;
        let resp = ensure_success(self.kind, resp).await?;
        let body: Resp = resp
            .json()
            .await
            .map_err(|e| LlmError::provider(self.kind, format!("malformed response: {e}")))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::provider(self.kind, "response contained no choices"))?;

        Ok(LlmResponse {
            content: choice.message.content.unwrap_or_default(),
            model: body.model.unwrap_or_else(|| opts.model.clone()),
            finish_reason: choice.finish_reason,
            usage: body.usage,
            cached: false,
        })
    }
}

impl Provider for OpenAiCompatProvider {
    fn complete<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        opts: &'a ResolvedOptions,
    ) -> ProviderFuture<'a> {
        Box::pin(self.complete_impl(messages, opts))
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }
}

// ------------------------------------------------------------
// Anthropic Messages API
// ------------------------------------------------------------

pub struct AnthropicProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl AnthropicProvider {
    pub fn new(api_key: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: ANTHROPIC_BASE_URL.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            timeout,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn complete_impl(
        &self,
        messages: &[ChatMessage],
        opts: &ResolvedOptions,
    ) -> Result<LlmResponse, LlmError> {
        let kind = ProviderKind::Anthropic;
        let Some(api_key) = &self.api_key else {
            return Err(LlmError::provider(kind, "ANTHROPIC_API_KEY is not set"));
        };

        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            max_tokens: u32,
            temperature: f32,
            #[serde(skip_serializing_if = "Option::is_none")]
            system: Option<String>,
            messages: Vec<&'a ChatMessage>,
        }
        #[derive(Deserialize)]
        struct Resp {
            #[serde(default)]
            model: Option<String>,
            #[serde(default)]
            content: Vec<Block>,
            #[serde(default)]
            stop_reason: Option<String>,
            #[serde(default)]
            usage: Option<AnthropicUsage>,
        }
        #[derive(Deserialize)]
        struct Block {
            #[serde(default)]
            text: Option<String>,
        }
        #[derive(Deserialize)]
        struct AnthropicUsage {
            input_tokens: u32,
            output_tokens: u32,
        }

        // System prompts travel in a dedicated field, not in the message list.
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .collect();
        let req = Req {
            model: &opts.model,
            max_tokens: opts.max_tokens,
            temperature: opts.temperature,
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            messages: messages.iter().filter(|m| m.role != "system").collect(),
        };

        let url = format!("{}/messages", self.base_url.trim_end_matches('/'));
        let resp = self
            .http
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&req)
            .send()
            .await
            .map_err(|e| transport_error(kind, self.timeout, e))?;
        let resp = ensure_success(kind, resp).await?;
        let body: Resp = resp
            .json()
            .await
            .map_err(|e| LlmError::provider(kind, format!("malformed response: {e}")))?;

        let content = body
            .content
            .into_iter()
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(LlmResponse {
            content,
            model: body.model.unwrap_or_else(|| opts.model.clone()),
            finish_reason: body.stop_reason,
            usage: body.usage.map(|u| Usage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
                total_tokens: u.input_tokens + u.output_tokens,
            }),
            cached: false,
        })
    }
}

impl Provider for AnthropicProvider {
    fn complete<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        opts: &'a ResolvedOptions,
    ) -> ProviderFuture<'a> {
        Box::pin(self.complete_impl(messages, opts))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }
}

// ------------------------------------------------------------
// Mock provider for tests/local runs
// ------------------------------------------------------------

/// Deterministic provider that counts its calls.
pub struct MockProvider {
    reply: Result<String, String>,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            reply: Ok(content.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Every call fails with a provider error carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: Err(message.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Provider for MockProvider {
    fn complete<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        opts: &'a ResolvedOptions,
    ) -> ProviderFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let out = match &self.reply {
            Ok(content) => {
                let prompt_tokens = messages
                    .iter()
                    .map(|m| m.content.split_whitespace().count() as u32)
                    .sum::<u32>();
                let completion_tokens = content.split_whitespace().count() as u32;
                Ok(LlmResponse {
                    content: content.clone(),
                    model: opts.model.clone(),
                    finish_reason: Some("stop".to_string()),
                    usage: Some(Usage {
                        prompt_tokens,
                        completion_tokens,
                        total_tokens: prompt_tokens + completion_tokens,
                    }),
                    cached: false,
                })
            }
            Err(message) => Err(LlmError::provider(ProviderKind::Mock, message.clone())),
        };
        Box::pin(async move { out })
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }
}
