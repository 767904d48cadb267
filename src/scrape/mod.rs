// src/scrape/mod.rs
//! Scraper pipeline: rate-limited fetch, per-source parsing, query filtering and
//! aggregation across registered sources.

pub mod config;
pub mod fetch;
pub mod manager;
pub mod providers;
pub mod query;
pub mod rate_limiter;
pub mod types;

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::OnceCell;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

pub use manager::{ManagerSettings, ScrapeReport, ScraperManager, ScraperManagerBuilder, SourceOutcome};
pub use query::{QueryFilter, QueryMode};
pub use rate_limiter::RateLimiter;
pub use types::{ScrapeError, ScrapedArticle, Scraper, SourceKind, SourceRegistration};

/// Upper bound for normalized article text, in chars.
pub const MAX_TEXT_CHARS: usize = 8_000;

/// Normalize text: decode entities, strip tags, fold typographic quotes, collapse
/// whitespace, trim and cap length.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("whitespace regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect();
    }
    out
}

/// Parse a feed/page timestamp into UTC. Accepts RFC 2822 (RSS `pubDate`),
/// RFC 3339 (Atom, `<time datetime>`), and bare `YYYY-MM-DD` dates.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc2822) {
        return Utc
            .timestamp_opt(dt.unix_timestamp(), dt.nanosecond())
            .single();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_strips_markup_and_collapses_ws() {
        let s = "  <p>Hello,&nbsp;&nbsp;<b>world</b></p>\n\n &ldquo;ok&rdquo; ";
        assert_eq!(normalize_text(s), "Hello, world \"ok\"");
    }

    #[test]
    fn normalize_text_caps_length() {
        let long = "a".repeat(MAX_TEXT_CHARS + 50);
        assert_eq!(normalize_text(&long).chars().count(), MAX_TEXT_CHARS);
    }

    #[test]
    fn timestamps_normalize_to_utc() {
        let a = parse_timestamp("Tue, 10 Jun 2025 14:30:00 +0200").unwrap();
        let b = parse_timestamp("2025-06-10T12:30:00Z").unwrap();
        assert_eq!(a, b);
        assert_eq!(
            parse_timestamp("2025-06-10").unwrap().to_rfc3339(),
            "2025-06-10T00:00:00+00:00"
        );
        assert!(parse_timestamp("yesterday-ish").is_none());
        assert!(parse_timestamp("  ").is_none());
    }
}
