// src/config/llm.rs
use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{env_flag, env_parse, env_string};
use crate::llm::ProviderKind;

pub const DEFAULT_MODEL: &str = "gpt-4-turbo-preview";
pub const DEFAULT_LOCAL_BASE_URL: &str = "http://localhost:8080/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    pub enable_caching: bool,
    pub cache_ttl_secs: u64,
    /// Never serialized.
    #[serde(skip)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub openai_organization: Option<String>,
    #[serde(skip)]
    pub anthropic_api_key: Option<String>,
    pub local_base_url: String,
    /// `AI_TEST_MODE=mock`: every provider is replaced by the mock.
    pub test_mode: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            request_timeout_secs: 30,
            enable_caching: true,
            cache_ttl_secs: 3600,
            openai_api_key: None,
            openai_organization: None,
            anthropic_api_key: None,
            local_base_url: DEFAULT_LOCAL_BASE_URL.to_string(),
            test_mode: false,
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        let cfg = Self {
            provider: env_parse("LLM_PROVIDER", d.provider),
            model: env_string("LLM_MODEL").unwrap_or(d.model),
            temperature: env_parse("LLM_TEMPERATURE", d.temperature),
            max_tokens: env_parse("LLM_MAX_TOKENS", d.max_tokens),
            request_timeout_secs: env_parse("LLM_REQUEST_TIMEOUT_SECS", d.request_timeout_secs),
            enable_caching: env_flag("LLM_ENABLE_CACHING", d.enable_caching),
            cache_ttl_secs: env_parse("LLM_CACHE_TTL_SECS", d.cache_ttl_secs),
            openai_api_key: env_string("OPENAI_API_KEY"),
            openai_organization: env_string("OPENAI_ORGANIZATION"),
            anthropic_api_key: env_string("ANTHROPIC_API_KEY"),
            local_base_url: env_string("LLM_LOCAL_BASE_URL").unwrap_or(d.local_base_url),
            test_mode: env::var("AI_TEST_MODE")
                .map(|v| v.trim().eq_ignore_ascii_case("mock"))
                .unwrap_or(false),
        }
        .sanitized();
        tracing::debug!(
            provider = %cfg.provider,
            model = %cfg.model,
            caching = cfg.enable_caching,
            test_mode = cfg.test_mode,
            "llm config loaded"
        );
        cfg
    }

    /// Reset out-of-range defaults so requests relying on them stay valid.
    pub fn sanitized(mut self) -> Self {
        let d = Self::default();
        if !(0.0..=1.0).contains(&self.temperature) {
            tracing::warn!(
                value = self.temperature,
                fallback = d.temperature,
                "LLM_TEMPERATURE outside [0, 1]; using default"
            );
            self.temperature = d.temperature;
        }
        if self.max_tokens == 0 {
            tracing::warn!(fallback = d.max_tokens, "LLM_MAX_TOKENS must be > 0; using default");
            self.max_tokens = d.max_tokens;
        }
        self
    }

    /// Config for tests: mock provider, caching on.
    pub fn mock() -> Self {
        Self {
            provider: ProviderKind::Mock,
            test_mode: true,
            ..Self::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn out_of_range_sampling_env_falls_back_to_defaults() {
        env::set_var("LLM_TEMPERATURE", "1.5");
        env::set_var("LLM_MAX_TOKENS", "0");
        let c = LlmConfig::from_env();
        env::remove_var("LLM_TEMPERATURE");
        env::remove_var("LLM_MAX_TOKENS");

        assert!((c.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(c.max_tokens, 2000);
    }

    #[test]
    #[serial]
    fn in_range_sampling_env_is_kept() {
        env::set_var("LLM_TEMPERATURE", "0");
        env::set_var("LLM_MAX_TOKENS", "64");
        let c = LlmConfig::from_env();
        env::remove_var("LLM_TEMPERATURE");
        env::remove_var("LLM_MAX_TOKENS");

        assert_eq!(c.temperature, 0.0);
        assert_eq!(c.max_tokens, 64);
    }

    #[test]
    fn defaults_match_documented_values() {
        let c = LlmConfig::default();
        assert_eq!(c.provider, ProviderKind::OpenAi);
        assert_eq!(c.model, "gpt-4-turbo-preview");
        assert!((c.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(c.max_tokens, 2000);
        assert!(c.enable_caching);
        assert_eq!(c.cache_ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn api_keys_are_not_serialized() {
        let c = LlmConfig {
            openai_api_key: Some("sk-secret".into()),
            ..LlmConfig::default()
        };
        let json = serde_json::to_string(&c).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}
