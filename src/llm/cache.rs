// src/llm/cache.rs
//! In-memory TTL cache for completed LLM responses.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::time::Instant;

use crate::llm::types::{ChatMessage, LlmResponse, ResolvedOptions};

pub const DEFAULT_MAX_ENTRIES: usize = 1024;

struct Entry {
    stored_at: Instant,
    response: LlmResponse,
}

pub struct ResponseCache {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<String, Entry>>,
}

/// Stable key over everything that determines a completion.
pub fn cache_key(messages: &[ChatMessage], opts: &ResolvedOptions) -> String {
    #[derive(Serialize)]
    struct KeyMaterial<'a> {
        messages: &'a [ChatMessage],
        opts: &'a ResolvedOptions,
    }
    let bytes = serde_json::to_vec(&KeyMaterial { messages, opts }).unwrap_or_default();
    let digest = Sha256::digest(&bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh entry for `key`, if any. Expired entries are dropped on read.
    pub fn get(&self, key: &str) -> Option<LlmResponse> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some(e) if e.stored_at.elapsed() < self.ttl => Some(e.response.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: String, response: LlmResponse) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            let ttl = self.ttl;
            entries.retain(|_, e| e.stored_at.elapsed() < ttl);
            // Still full: evict the oldest entry.
            if entries.len() >= self.max_entries {
                if let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, e)| e.stored_at)
                    .map(|(k, _)| k.clone())
                {
                    entries.remove(&oldest);
                }
            }
        }
        entries.insert(
            key,
            Entry {
                stored_at: Instant::now(),
                response,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut e) = self.entries.lock() {
            e.clear();
        }
    }
}
