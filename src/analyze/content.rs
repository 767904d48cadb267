// src/analyze/content.rs
//! Vocabulary-based content analysis: technology mentions and a job-impact heuristic.
//!
//! Matching is case-insensitive on word boundaries, so `AI` does not fire on "said"
//! and `CI/CD` matches as a whole token. Results are fully determined by the text and
//! the vocabulary.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const ENV_VOCAB_PATH: &str = "ANALYZER_VOCAB_PATH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactCategory {
    /// Contribution of this category to the impact score when fully saturated.
    pub weight: f32,
    pub phrases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub technologies: Vec<String>,
    #[serde(default)]
    pub impact: BTreeMap<String, ImpactCategory>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        let technologies = [
            "AI",
            "ML",
            "machine learning",
            "deep learning",
            "LLM",
            "GPT",
            "Copilot",
            "GitHub",
            "CI/CD",
            "Docker",
            "Kubernetes",
            "automation",
            "testing",
            "deployment",
            "infrastructure as code",
            "Terraform",
            "Ansible",
            "Jenkins",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let mut impact = BTreeMap::new();
        let mut add = |name: &str, weight: f32, phrases: &[&str]| {
            impact.insert(
                name.to_string(),
                ImpactCategory {
                    weight,
                    phrases: phrases.iter().map(|s| s.to_string()).collect(),
                },
            );
        };
        add("junior", 0.25, &["junior", "entry-level", "early career", "new grad"]);
        add("mid", 0.15, &["mid-level", "experienced", "senior"]);
        add(
            "task",
            0.3,
            &["task automation", "code generation", "testing automation"],
        );
        add(
            "role",
            0.4,
            &["role elimination", "job replacement", "reduce hiring"],
        );

        Self {
            technologies,
            impact,
        }
    }
}

/// What the analyzer found in one text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    /// Sorted, deduplicated vocabulary entries.
    pub technologies: Vec<String>,
    /// In `[0, 1]`.
    pub impact_score: f32,
    /// Impact category -> phrases found, in vocabulary order.
    pub job_impact: BTreeMap<String, Vec<String>>,
}

struct CompiledCategory {
    name: String,
    weight: f32,
    phrases: Vec<(String, Regex)>,
}

pub struct ContentAnalyzer {
    technologies: Vec<(String, Regex)>,
    categories: Vec<CompiledCategory>,
}

impl Default for ContentAnalyzer {
    fn default() -> Self {
        Self::new(&Vocabulary::default()).expect("built-in vocabulary compiles")
    }
}

fn term_regex(term: &str) -> Result<Regex, regex::Error> {
    let pattern = format!(r"(?i)(?:^|\W){}(?:\W|$)", regex::escape(term.trim()));
    Regex::new(&pattern)
}

fn compile_terms(terms: &[String]) -> anyhow::Result<Vec<(String, Regex)>> {
    terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| {
            let re = term_regex(t).with_context(|| format!("compiling vocabulary term '{t:.40}'"))?;
            Ok((t.to_string(), re))
        })
        .collect()
}

impl ContentAnalyzer {
    /// Fails when a term cannot be compiled, e.g. one past the regex size limit.
    pub fn new(vocab: &Vocabulary) -> anyhow::Result<Self> {
        let technologies = compile_terms(&vocab.technologies)?;

        let categories = vocab
            .impact
            .iter()
            .map(|(name, cat)| {
                Ok(CompiledCategory {
                    name: name.clone(),
                    weight: cat.weight.max(0.0),
                    phrases: compile_terms(&cat.phrases)
                        .with_context(|| format!("impact category {name:?}"))?,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            technologies,
            categories,
        })
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading vocabulary from {}", path.display()))?;
        let vocab: Vocabulary = serde_json::from_str(&data).context("parsing vocabulary json")?;
        Self::new(&vocab)
    }

    /// Use `$ANALYZER_VOCAB_PATH` when set and readable, the built-in vocabulary otherwise.
    pub fn from_env_or_default() -> Self {
        match std::env::var(ENV_VOCAB_PATH) {
            Ok(p) => match Self::from_json_file(Path::new(&p)) {
                Ok(a) => a,
                Err(e) => {
                    tracing::warn!(error = ?e, path = %p, "vocabulary load failed; using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn extract_technologies(&self, text: &str) -> Vec<String> {
        let mut found: Vec<String> = self
            .technologies
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(name, _)| name.clone())
            .collect();
        found.sort();
        found.dedup();
        found
    }

    pub fn analyze(&self, text: &str) -> Analysis {
        let mut job_impact = BTreeMap::new();
        let mut score = 0.0f32;

        for cat in &self.categories {
            let hits: Vec<String> = cat
                .phrases
                .iter()
                .filter(|(_, re)| re.is_match(text))
                .map(|(p, _)| p.clone())
                .collect();
            if hits.is_empty() {
                continue;
            }
            // Each extra distinct phrase halves the remaining headroom of the category.
            let saturation = 1.0 - 0.5f32.powi(hits.len() as i32);
            score += cat.weight * saturation;
            job_impact.insert(cat.name.clone(), hits);
        }

        Analysis {
            technologies: self.extract_technologies(text),
            impact_score: score.clamp(0.0, 1.0),
            job_impact,
        }
    }
}
