// tests/config_files.rs
//
// File-backed configuration: source definitions (TOML) and analyzer vocabulary (JSON).
// Env-mutating tests are serialized.

use std::env;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use serial_test::serial;

use automation_tracker::analyze::ContentAnalyzer;
use automation_tracker::scrape::config::{
    build_scrapers, load_sources_default, load_sources_from, ENV_SOURCES_PATH,
};
use automation_tracker::scrape::fetch::Fetcher;
use automation_tracker::scrape::{QueryMode, RateLimiter, Scraper, SourceKind};

const SOURCES: &str = r#"
[[source]]
name = "ai_wire"
kind = "rss"
base_url = "https://wire.test"
rate_limit = 3.0
feeds = ["https://wire.test/feed.xml"]

[[source]]
name = "eng_blog"
kind = "html"
base_url = "https://blog.test"
rate_limit = 0.5

[source.selectors]
item = "article"
title = "h2"
"#;

fn write_temp(contents: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("tempfile");
    f.write_all(contents.as_bytes()).expect("write");
    f
}

#[test]
fn sources_file_builds_scrapers_and_registers_rate_limits() {
    let file = write_temp(SOURCES, ".toml");
    let defs = load_sources_from(file.path()).expect("valid sources");
    assert_eq!(defs.len(), 2);
    assert_eq!(defs[1].kind, SourceKind::Html);

    let limiter = Arc::new(RateLimiter::new(Duration::from_secs(1)));
    let fetcher = Fetcher::new(limiter.clone(), Duration::from_secs(5)).unwrap();
    let scrapers = build_scrapers(&defs, &fetcher, QueryMode::Keywords).unwrap();

    let names: Vec<&str> = scrapers.iter().map(|s| s.name()).collect();
    assert_eq!(names, vec!["ai_wire", "eng_blog"]);
    assert_eq!(limiter.interval_for("ai_wire"), Duration::from_secs(3));
    assert_eq!(limiter.interval_for("eng_blog"), Duration::from_millis(500));
}

#[test]
fn malformed_sources_file_is_an_error() {
    let file = write_temp("[[source]]\nname = 1\n", ".toml");
    assert!(load_sources_from(file.path()).is_err());
}

#[test]
#[serial]
fn env_path_takes_precedence() {
    let file = write_temp(SOURCES, ".toml");
    env::set_var(ENV_SOURCES_PATH, file.path());
    let defs = load_sources_default();
    env::remove_var(ENV_SOURCES_PATH);

    let defs = defs.expect("loaded from env path");
    assert_eq!(defs[0].name, "ai_wire");
}

#[test]
#[serial]
fn env_path_must_exist() {
    env::set_var(ENV_SOURCES_PATH, "/definitely/not/here.toml");
    let res = load_sources_default();
    env::remove_var(ENV_SOURCES_PATH);
    assert!(res.is_err());
}

#[test]
#[serial]
fn without_env_the_repo_config_or_builtin_default_is_used() {
    env::remove_var(ENV_SOURCES_PATH);
    let defs = load_sources_default().expect("fallback sources");
    assert!(defs.iter().any(|d| d.name == "tech_news"));
}

#[test]
fn vocabulary_json_replaces_builtin_terms() {
    let vocab = r#"{
        "technologies": ["Rust", "WebAssembly"],
        "impact": {
            "role": {"weight": 0.5, "phrases": ["headcount freeze"]}
        }
    }"#;
    let file = write_temp(vocab, ".json");
    let analyzer = ContentAnalyzer::from_json_file(file.path()).expect("vocabulary");

    let out = analyzer.analyze("Rust and WebAssembly teams face a headcount freeze; AI too.");
    assert_eq!(out.technologies, vec!["Rust", "WebAssembly"]);
    assert!((out.impact_score - 0.25).abs() < 1e-6);
    assert_eq!(out.job_impact["role"], vec!["headcount freeze".to_string()]);
}

#[test]
#[serial]
fn unreadable_vocabulary_falls_back_to_defaults() {
    env::set_var("ANALYZER_VOCAB_PATH", "/missing/vocab.json");
    let analyzer = ContentAnalyzer::from_env_or_default();
    env::remove_var("ANALYZER_VOCAB_PATH");
    assert_eq!(analyzer.extract_technologies("Docker on Kubernetes"), vec!["Docker", "Kubernetes"]);
}
