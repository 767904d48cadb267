// src/scrape/query.rs
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How an optional query term is matched against title + text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Whole query as a case-insensitive substring.
    #[default]
    Substring,
    /// Any whitespace-separated keyword, case-insensitive.
    Keywords,
}

impl FromStr for QueryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "substring" => Ok(QueryMode::Substring),
            "keywords" | "keyword" | "any" => Ok(QueryMode::Keywords),
            other => Err(format!("unknown query mode: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryFilter {
    mode: QueryMode,
    terms: Vec<String>, // lowercased; empty means "match everything"
}

impl QueryFilter {
    pub fn new(query: Option<&str>, mode: QueryMode) -> Self {
        let q = query.map(str::trim).unwrap_or_default().to_lowercase();
        let terms = if q.is_empty() {
            Vec::new()
        } else {
            match mode {
                QueryMode::Substring => vec![q],
                QueryMode::Keywords => q.split_whitespace().map(str::to_string).collect(),
            }
        };
        Self { mode, terms }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn mode(&self) -> QueryMode {
        self.mode
    }

    pub fn matches(&self, title: &str, text: &str) -> bool {
        if self.terms.is_empty() {
            return true;
        }
        let hay = format!("{} {}", title, text).to_lowercase();
        self.terms.iter().any(|t| hay.contains(t.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_query_matches_everything() {
        let f = QueryFilter::new(Some("   "), QueryMode::Substring);
        assert!(f.is_empty());
        assert!(f.matches("anything", ""));
        assert!(QueryFilter::new(None, QueryMode::Keywords).matches("", ""));
    }

    #[test]
    fn substring_mode_needs_whole_phrase() {
        let f = QueryFilter::new(Some("Code Generation"), QueryMode::Substring);
        assert!(f.matches("LLM code generation at scale", ""));
        assert!(!f.matches("code review and generation", ""));
    }

    #[test]
    fn keyword_mode_matches_any_term() {
        let f = QueryFilter::new(Some("copilot terraform"), QueryMode::Keywords);
        assert!(f.matches("", "Teams adopt Terraform modules"));
        assert!(!f.matches("Kubernetes 1.31 released", "no match here"));
    }

    #[test]
    fn mode_parses_from_str() {
        assert_eq!("KEYWORDS".parse::<QueryMode>().unwrap(), QueryMode::Keywords);
        assert!("fuzzy".parse::<QueryMode>().is_err());
    }
}
