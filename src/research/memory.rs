// src/research/memory.rs
//! Bounded observation log for the research agent.
//!
//! New observations land in short-term memory. When it overflows, the older
//! half is consolidated into long-term memory, which itself drops its oldest
//! items past `max_long_term`.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_MAX_SHORT_TERM: usize = 100;
pub const DEFAULT_MAX_LONG_TERM: usize = 1_000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryItem {
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct Memory {
    short_term: VecDeque<MemoryItem>,
    long_term: VecDeque<MemoryItem>,
    #[serde(skip)]
    max_short_term: usize,
    #[serde(skip)]
    max_long_term: usize,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SHORT_TERM, DEFAULT_MAX_LONG_TERM)
    }
}

impl Memory {
    pub fn new(max_short_term: usize, max_long_term: usize) -> Self {
        Self {
            short_term: VecDeque::new(),
            long_term: VecDeque::new(),
            max_short_term: max_short_term.max(1),
            max_long_term,
        }
    }

    pub fn add_observation(&mut self, content: impl Into<String>, metadata: Value) {
        self.short_term.push_back(MemoryItem {
            content: content.into(),
            timestamp: Utc::now(),
            metadata,
        });
        if self.short_term.len() > self.max_short_term {
            self.consolidate();
        }
    }

    fn consolidate(&mut self) {
        let split = self.short_term.len() / 2;
        self.long_term.extend(self.short_term.drain(..split));
        while self.long_term.len() > self.max_long_term {
            self.long_term.pop_front();
        }
    }

    /// Newest first. Items whose content or metadata mention `query`
    /// (case-insensitive); an empty query matches everything.
    pub fn relevant(&self, query: &str, limit: usize) -> Vec<MemoryItem> {
        let q = query.trim().to_lowercase();
        self.short_term
            .iter()
            .rev()
            .chain(self.long_term.iter().rev())
            .filter(|item| {
                q.is_empty()
                    || item.content.to_lowercase().contains(&q)
                    || item.metadata.to_string().to_lowercase().contains(&q)
            })
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn short_term_len(&self) -> usize {
        self.short_term.len()
    }

    pub fn long_term_len(&self) -> usize {
        self.long_term.len()
    }

    pub fn len(&self) -> usize {
        self.short_term.len() + self.long_term.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overflow_moves_older_half_to_long_term() {
        let mut m = Memory::new(4, 100);
        for i in 0..5 {
            m.add_observation(format!("obs {i}"), json!({}));
        }
        assert_eq!(m.long_term_len(), 2);
        assert_eq!(m.short_term_len(), 3);
        assert_eq!(m.relevant("", 1)[0].content, "obs 4");
    }

    #[test]
    fn long_term_is_bounded() {
        let mut m = Memory::new(2, 3);
        for i in 0..20 {
            m.add_observation(format!("obs {i}"), json!({}));
        }
        assert!(m.long_term_len() <= 3);
        assert!(m.short_term_len() <= 2);
    }

    #[test]
    fn relevant_matches_content_and_metadata() {
        let mut m = Memory::default();
        m.add_observation("Completed research on copilot", json!({"topic": "copilot"}));
        m.add_observation("Executed web_search", json!({"query": "Kubernetes operators"}));
        m.add_observation("unrelated", json!({}));

        let hits = m.relevant("kubernetes", 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "Executed web_search");
        assert_eq!(m.relevant("", 2).len(), 2);
    }
}
