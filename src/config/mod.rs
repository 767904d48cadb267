// src/config/mod.rs
//! Process configuration read from the environment (after `dotenvy`).

pub mod llm;

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::scrape::fetch::DEFAULT_USER_AGENT;
use crate::scrape::{ManagerSettings, QueryMode};

pub use llm::LlmConfig;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://automation_tracker.db";

/// Trimmed, non-empty value of `key`.
pub(crate) fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse `key`, falling back to `default` (with a warning) when the value is invalid.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match env_string(key) {
        None => default,
        Some(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key, value = %raw, error = %e, "invalid env value; using default");
                default
            }
        },
    }
}

pub(crate) fn env_flag(key: &str, default: bool) -> bool {
    match env_string(key).map(|v| v.to_ascii_lowercase()) {
        None => default,
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                tracing::warn!(key, value = %v, "invalid boolean env value; using default");
                default
            }
        },
    }
}

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Per-HTTP-request bound.
    pub request_timeout: Duration,
    pub manager: ManagerSettings,
    pub query_mode: QueryMode,
    pub user_agent: String,
    /// Seconds between requests for sources without their own rate limit.
    pub default_interval: Duration,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            manager: ManagerSettings::default(),
            query_mode: QueryMode::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            default_interval: Duration::from_secs(1),
        }
    }
}

impl ScraperConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        let secs = |key: &str, fallback: Duration| {
            Duration::from_secs(env_parse(key, fallback.as_secs()).max(1))
        };
        Self {
            request_timeout: secs("SCRAPER_REQUEST_TIMEOUT_SECS", d.request_timeout),
            manager: ManagerSettings {
                max_concurrency: env_parse("SCRAPER_MAX_CONCURRENCY", d.manager.max_concurrency)
                    .max(1),
                source_timeout: secs("SCRAPER_SOURCE_TIMEOUT_SECS", d.manager.source_timeout),
                overall_timeout: secs("SCRAPER_OVERALL_TIMEOUT_SECS", d.manager.overall_timeout),
            },
            query_mode: env_parse("SCRAPER_QUERY_MODE", d.query_mode),
            user_agent: env_string("SCRAPER_USER_AGENT").unwrap_or(d.user_agent),
            default_interval: d.default_interval,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub scraper: ScraperConfig,
    pub llm: LlmConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            scraper: ScraperConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: env_string("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            scraper: ScraperConfig::from_env(),
            llm: LlmConfig::from_env(),
        }
    }

    /// In-memory database and mock LLM; used by tests.
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            scraper: ScraperConfig::default(),
            llm: LlmConfig::mock(),
        }
    }
}
