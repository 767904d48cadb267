// src/scrape/providers/mod.rs
pub mod html;
pub mod rss;

pub use html::{extract_main_text, HtmlListingScraper, HtmlSelectors};
pub use rss::{RssFeedOptions, RssFeedScraper};

use crate::scrape::types::ScrapeError;

/// Fold the failures of several requests for one source into a single error.
/// A lone failure is passed through unchanged.
pub(crate) fn collapse_failures(source: &str, mut failures: Vec<ScrapeError>) -> ScrapeError {
    if failures.is_empty() {
        return ScrapeError::retrieval(source, "no request succeeded");
    }
    if failures.len() == 1 {
        return failures.remove(0);
    }
    let joined = failures
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    ScrapeError::retrieval(
        source,
        format!("all {} requests failed: {joined}", failures.len()),
    )
}
