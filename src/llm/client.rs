// src/llm/client.rs
//! `LlmClient`: provider selection, option defaults, validation and response caching.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::config::LlmConfig;
use crate::llm::cache::{cache_key, ResponseCache};
use crate::llm::providers::{AnthropicProvider, MockProvider, OpenAiCompatProvider, Provider};
use crate::llm::types::{
    ChatMessage, GenerateOptions, LlmError, LlmResponse, ProviderKind, ResolvedOptions,
};

pub const MOCK_REPLY: &str = "This is a mock response.";

pub struct LlmClient {
    config: LlmConfig,
    providers: HashMap<ProviderKind, Arc<dyn Provider>>,
    cache: Option<ResponseCache>,
}

impl LlmClient {
    /// Build every provider the config can support. In test mode all kinds resolve
    /// to a single mock.
    pub fn from_config(config: LlmConfig) -> anyhow::Result<Self> {
        let mut providers: HashMap<ProviderKind, Arc<dyn Provider>> = HashMap::new();
        let timeout = config.request_timeout();

        if config.test_mode {
            tracing::info!("AI_TEST_MODE=mock; llm providers replaced by mock");
            let mock: Arc<dyn Provider> = Arc::new(MockProvider::new(MOCK_REPLY));
            for kind in [
                ProviderKind::OpenAi,
                ProviderKind::Anthropic,
                ProviderKind::Local,
                ProviderKind::Mock,
            ] {
                providers.insert(kind, mock.clone());
            }
        } else {
            providers.insert(
                ProviderKind::OpenAi,
                Arc::new(OpenAiCompatProvider::openai(
                    config.openai_api_key.clone(),
                    config.openai_organization.clone(),
                    timeout,
                )?),
            );
            providers.insert(
                ProviderKind::Anthropic,
                Arc::new(AnthropicProvider::new(
                    config.anthropic_api_key.clone(),
                    timeout,
                )?),
            );
            providers.insert(
                ProviderKind::Local,
                Arc::new(OpenAiCompatProvider::local(
                    config.local_base_url.clone(),
                    timeout,
                )?),
            );
            providers.insert(
                ProviderKind::Mock,
                Arc::new(MockProvider::new(MOCK_REPLY)),
            );
        }

        Ok(Self::assemble(config, providers))
    }

    /// Client with exactly one provider, registered under `provider.kind()`; the
    /// config's default provider is switched to it.
    pub fn with_provider(mut config: LlmConfig, provider: Arc<dyn Provider>) -> Self {
        let kind = provider.kind();
        config.provider = kind;
        let mut providers = HashMap::new();
        providers.insert(kind, provider);
        Self::assemble(config, providers)
    }

    /// Register `provider` under `kind`, replacing any existing one.
    pub fn register(mut self, kind: ProviderKind, provider: Arc<dyn Provider>) -> Self {
        self.providers.insert(kind, provider);
        self
    }

    fn assemble(config: LlmConfig, providers: HashMap<ProviderKind, Arc<dyn Provider>>) -> Self {
        let cache = config
            .enable_caching
            .then(|| ResponseCache::new(config.cache_ttl()));
        Self {
            config,
            providers,
            cache,
        }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&ResponseCache> {
        self.cache.as_ref()
    }

    /// Apply defaults and validate.
    pub fn resolve(
        &self,
        messages: &[ChatMessage],
        options: &GenerateOptions,
    ) -> Result<ResolvedOptions, LlmError> {
        if messages.is_empty() {
            return Err(LlmError::Validation("messages must not be empty".into()));
        }
        if messages.iter().all(|m| m.content.trim().is_empty()) {
            return Err(LlmError::Validation("messages have no content".into()));
        }
        if let Some(bad) = messages
            .iter()
            .find(|m| !matches!(m.role.as_str(), "system" | "user" | "assistant"))
        {
            return Err(LlmError::Validation(format!("unknown role: {}", bad.role)));
        }

        let temperature = options.temperature.unwrap_or(self.config.temperature);
        if !(0.0..=1.0).contains(&temperature) {
            return Err(LlmError::Validation(format!(
                "temperature must be within [0, 1], got {temperature}"
            )));
        }
        let max_tokens = options.max_tokens.unwrap_or(self.config.max_tokens);
        if max_tokens == 0 {
            return Err(LlmError::Validation("max_tokens must be positive".into()));
        }
        let model = options
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.config.model.as_str())
            .to_string();

        Ok(ResolvedOptions {
            provider: options.provider.unwrap_or(self.config.provider),
            model,
            temperature,
            max_tokens,
        })
    }

    /// Generate a completion. Identical (messages, resolved options) pairs are served
    /// from the cache while their entry is younger than the TTL.
    pub async fn generate_async(
        &self,
        messages: &[ChatMessage],
        options: &GenerateOptions,
    ) -> Result<LlmResponse, LlmError> {
        let opts = self.resolve(messages, options)?;
        let provider = self.providers.get(&opts.provider).ok_or_else(|| {
            LlmError::provider(opts.provider, "provider is not configured")
        })?;
        let label = opts.provider.as_str();

        let key = self.cache.as_ref().map(|_| cache_key(messages, &opts));
        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(mut hit) = cache.get(key) {
                counter!("llm_cache_hits_total", "provider" => label).increment(1);
                tracing::debug!(provider = label, model = %opts.model, "llm cache hit");
                hit.cached = true;
                return Ok(hit);
            }
        }

        counter!("llm_requests_total", "provider" => label).increment(1);
        tracing::info!(provider = label, model = %opts.model, "llm request");
        let resp = provider.complete(messages, &opts).await.map_err(|e| {
            tracing::warn!(provider = label, error = %e, "llm request failed");
            e
        })?;

        if let (Some(cache), Some(key)) = (&self.cache, key) {
            cache.insert(key, resp.clone());
        }
        Ok(resp)
    }

    /// Blocking wrapper around `generate_async`.
    ///
    /// Inside a multi-threaded tokio runtime the worker is handed over with
    /// `block_in_place`; outside any runtime a private current-thread runtime is
    /// used. A current-thread runtime cannot be blocked and yields `Runtime`.
    pub fn generate(
        &self,
        messages: &[ChatMessage],
        options: &GenerateOptions,
    ) -> Result<LlmResponse, LlmError> {
        match Handle::try_current() {
            Ok(handle) => match handle.runtime_flavor() {
                RuntimeFlavor::CurrentThread => Err(LlmError::Runtime(
                    "blocking generate called on a current-thread runtime; use generate_async"
                        .into(),
                )),
                _ => tokio::task::block_in_place(|| {
                    handle.block_on(self.generate_async(messages, options))
                }),
            },
            Err(_) => {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| LlmError::Runtime(format!("building runtime: {e}")))?;
                rt.block_on(self.generate_async(messages, options))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> LlmClient {
        LlmClient::from_config(LlmConfig::mock()).unwrap()
    }

    #[test]
    fn resolve_applies_defaults() {
        let c = client();
        let r = c
            .resolve(&[ChatMessage::user("hi")], &GenerateOptions::default())
            .unwrap();
        assert_eq!(r.model, "gpt-4-turbo-preview");
        assert_eq!(r.max_tokens, 2000);
        assert_eq!(r.provider, ProviderKind::Mock);
    }

    #[test]
    fn resolve_rejects_bad_input() {
        let c = client();
        let hot = GenerateOptions {
            temperature: Some(1.5),
            ..Default::default()
        };
        assert!(matches!(
            c.resolve(&[ChatMessage::user("hi")], &hot),
            Err(LlmError::Validation(_))
        ));
        assert!(matches!(
            c.resolve(&[], &GenerateOptions::default()),
            Err(LlmError::Validation(_))
        ));
        assert!(matches!(
            c.resolve(&[ChatMessage::new("robot", "x")], &GenerateOptions::default()),
            Err(LlmError::Validation(_))
        ));
    }

    #[test]
    fn blocking_generate_works_without_runtime() {
        let c = client();
        let r = c
            .generate(&[ChatMessage::user("hello")], &GenerateOptions::default())
            .unwrap();
        assert_eq!(r.content, MOCK_REPLY);
        assert!(!r.cached);
    }

    #[tokio::test]
    async fn blocking_generate_refuses_current_thread_runtime() {
        let c = client();
        let r = c.generate(&[ChatMessage::user("hello")], &GenerateOptions::default());
        assert!(matches!(r, Err(LlmError::Runtime(_))));
    }
}
