// tests/rate_limiter.rs
//
// Per-source spacing under concurrent callers. Time is paused; tokio auto-advances
// the clock while every task is sleeping.

use std::sync::Arc;
use std::time::Duration;

use automation_tracker::scrape::RateLimiter;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn concurrent_callers_on_one_source_are_spaced() {
    let limiter = Arc::new(RateLimiter::new(Duration::from_millis(10)));
    limiter.register("tech_news", Duration::from_secs(2));

    let t0 = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..4 {
        let l = limiter.clone();
        handles.push(tokio::spawn(async move {
            l.wait_if_needed("tech_news").await;
            Instant::now()
        }));
    }

    let mut stamps = Vec::new();
    for h in handles {
        stamps.push(h.await.expect("task"));
    }
    stamps.sort();

    for pair in stamps.windows(2) {
        assert!(
            pair[1] - pair[0] >= Duration::from_secs(2),
            "calls closer than the configured interval: {:?}",
            pair[1] - pair[0]
        );
    }
    assert!(stamps[3] - t0 >= Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn sources_do_not_block_each_other() {
    let limiter = RateLimiter::new(Duration::from_secs(5));
    limiter.wait_if_needed("a").await;

    let t0 = Instant::now();
    let waited = limiter.wait_if_needed("b").await;
    assert_eq!(waited, Duration::ZERO);
    assert_eq!(Instant::now(), t0);
}

#[tokio::test(start_paused = true)]
async fn waiting_accounts_for_time_already_elapsed() {
    let limiter = RateLimiter::new(Duration::from_secs(1));
    limiter.register("s", Duration::from_millis(500));

    limiter.wait_if_needed("s").await;
    tokio::time::advance(Duration::from_millis(300)).await;
    let waited = limiter.wait_if_needed("s").await;
    assert_eq!(waited, Duration::from_millis(200));
}

#[test]
fn unregistered_sources_use_the_default_interval() {
    let limiter = RateLimiter::new(Duration::from_millis(750));
    limiter.register("fast", Duration::ZERO);
    assert_eq!(limiter.interval_for("fast"), Duration::ZERO);
    assert_eq!(limiter.interval_for("other"), Duration::from_millis(750));
}
