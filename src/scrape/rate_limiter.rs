// src/scrape/rate_limiter.rs
//! Per-source interval gate.
//!
//! Each source owns a slot holding the instant of its last request. The slot lock is
//! held across the sleep, so two tasks hitting the same source are serialized while
//! other sources proceed untouched.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

struct Slot {
    interval: Duration,
    last: tokio::sync::Mutex<Option<Instant>>,
}

impl Slot {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: tokio::sync::Mutex::new(None),
        }
    }
}

pub struct RateLimiter {
    default_interval: Duration,
    slots: Mutex<HashMap<String, Arc<Slot>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl RateLimiter {
    /// `default_interval` applies to sources that were never registered.
    pub fn new(default_interval: Duration) -> Self {
        Self {
            default_interval,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Set the minimum interval for `source`. Re-registering resets its history.
    pub fn register(&self, source: &str, interval: Duration) {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots.insert(source.to_string(), Arc::new(Slot::new(interval)));
    }

    pub fn interval_for(&self, source: &str) -> Duration {
        let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots
            .get(source)
            .map(|s| s.interval)
            .unwrap_or(self.default_interval)
    }

    fn slot(&self, source: &str) -> Arc<Slot> {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots
            .entry(source.to_string())
            .or_insert_with(|| Arc::new(Slot::new(self.default_interval)))
            .clone()
    }

    /// Wait until `source`'s interval has elapsed since its previous call, then stamp
    /// the current instant. The first call for a source returns immediately.
    /// Returns how long the caller was delayed.
    pub async fn wait_if_needed(&self, source: &str) -> Duration {
        let slot = self.slot(source);
        let mut last = slot.last.lock().await;

        let mut waited = Duration::ZERO;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < slot.interval {
                waited = slot.interval - elapsed;
                tracing::debug!(
                    source,
                    wait_ms = waited.as_millis() as u64,
                    "rate limit wait"
                );
                tokio::time::sleep(waited).await;
            }
        }
        *last = Some(Instant::now());
        waited
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_call_never_waits() {
        let rl = RateLimiter::new(Duration::from_secs(5));
        assert_eq!(rl.wait_if_needed("a").await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn second_call_waits_for_remaining_interval() {
        let rl = RateLimiter::default();
        rl.register("feed", Duration::from_millis(800));
        rl.wait_if_needed("feed").await;
        tokio::time::advance(Duration::from_millis(300)).await;
        let waited = rl.wait_if_needed("feed").await;
        assert_eq!(waited, Duration::from_millis(500));
    }

    #[test]
    fn unregistered_sources_use_default_interval() {
        let rl = RateLimiter::new(Duration::from_millis(250));
        rl.register("x", Duration::from_secs(2));
        assert_eq!(rl.interval_for("x"), Duration::from_secs(2));
        assert_eq!(rl.interval_for("y"), Duration::from_millis(250));
    }
}
