// src/analyze/mod.rs
//! Lightweight article analysis applied after scraping.

pub mod content;

pub use crate::analyze::content::{Analysis, ContentAnalyzer, ImpactCategory, Vocabulary};
