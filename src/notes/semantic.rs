//! Keyword-based semantic relationships between notes
//!
//! Every pair of notes is compared by the Jaccard similarity of their keyword
//! sets. Pairs above `min_similarity` get the strongest matching relationship
//! kind, plus `TEMPORAL_PROXIMITY` when both were modified close together.
//! The analysis is pure; writing the result is the pipeline's job.

use super::hashing::note_id;
use super::markdown::extract_title;
use crate::SemanticConfig;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-zA-Z]{3,}\b").expect("word regex is valid"));

const STOP_WORDS: &[&str] = &[
    "the", "and", "but", "for", "with", "are", "was", "were", "been", "have", "has", "had",
    "does", "did", "will", "would", "could", "should", "may", "might", "this", "that", "these",
    "those", "you", "she", "they",
];

/// Topic vocabularies used to classify a note's keywords, checked in order.
const DOMAINS: &[(&str, &[&str])] = &[
    (
        "programming",
        &["code", "function", "class", "method", "variable", "api", "implementation", "algorithm", "debug", "compile"],
    ),
    (
        "ai_ml",
        &["machine", "learning", "model", "neural", "training", "dataset", "prediction", "classification", "embedding"],
    ),
    (
        "system_design",
        &["system", "architecture", "design", "pattern", "component", "service", "infrastructure", "scalability", "performance"],
    ),
    (
        "data",
        &["data", "database", "query", "storage", "analysis", "pipeline", "etl", "warehouse", "schema", "migration"],
    ),
    (
        "frontend",
        &["component", "react", "vue", "css", "html", "interface", "responsive", "design"],
    ),
    (
        "backend",
        &["server", "api", "endpoint", "authentication", "authorization", "rest", "graphql", "microservice", "deployment"],
    ),
    (
        "devops",
        &["docker", "kubernetes", "deployment", "pipeline", "monitoring", "automation", "infrastructure"],
    ),
    (
        "security",
        &["security", "encryption", "authentication", "vulnerability", "attack", "defense", "audit", "compliance", "password"],
    ),
];

/// Relationship kinds produced by the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SemanticKind {
    HighlyRelated,
    RelatedTo,
    Contains,
    SameDomain,
    CrossDomain,
    Enhances,
    LooselyRelated,
    TemporalProximity,
}

impl SemanticKind {
    pub const ALL: [SemanticKind; 8] = [
        Self::HighlyRelated,
        Self::RelatedTo,
        Self::Contains,
        Self::SameDomain,
        Self::CrossDomain,
        Self::Enhances,
        Self::LooselyRelated,
        Self::TemporalProximity,
    ];

    /// Cypher relationship type.
    pub fn rel_type(&self) -> &'static str {
        match self {
            Self::HighlyRelated => "HIGHLY_RELATED",
            Self::RelatedTo => "RELATED_TO",
            Self::Contains => "CONTAINS",
            Self::SameDomain => "SAME_DOMAIN",
            Self::CrossDomain => "CROSS_DOMAIN",
            Self::Enhances => "ENHANCES",
            Self::LooselyRelated => "LOOSELY_RELATED",
            Self::TemporalProximity => "TEMPORAL_PROXIMITY",
        }
    }
}

impl fmt::Display for SemanticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rel_type())
    }
}

/// What the analysis needs to know about one note.
#[derive(Debug, Clone)]
pub struct NoteSummary {
    pub note_id: String,
    pub title: String,
    pub keywords: BTreeSet<String>,
    pub modified: Option<DateTime<Utc>>,
}

impl NoteSummary {
    pub fn new(
        vault_id: &str,
        relative_path: &str,
        content: &str,
        modified: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            note_id: note_id(vault_id, relative_path),
            title: extract_title(relative_path),
            keywords: extract_keywords(content),
            modified,
        }
    }
}

/// A relationship between two notes of the same vault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticRelationship {
    pub from_note_id: String,
    pub to_note_id: String,
    pub kind: SemanticKind,
    pub confidence: f32,
    pub similarity: f32,
    pub shared_keywords: Vec<String>,
}

/// Lowercased words of three or more letters, minus stop words.
pub fn extract_keywords(text: &str) -> BTreeSet<String> {
    let lower = text.to_lowercase();
    WORD_RE
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|word| !STOP_WORDS.contains(word))
        .map(str::to_string)
        .collect()
}

pub fn jaccard_similarity(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f32;
    let union = a.union(b).count() as f32;
    intersection / union
}

/// Domain with the most matching vocabulary words, if at least two match.
pub fn classify_domain(keywords: &BTreeSet<String>) -> Option<&'static str> {
    let mut best: Option<(&'static str, usize)> = None;
    for &(domain, words) in DOMAINS {
        let score = words.iter().filter(|w| keywords.contains(**w)).count();
        if score > best.map_or(0, |(_, s)| s) {
            best = Some((domain, score));
        }
    }
    best.filter(|(_, score)| *score >= 2).map(|(domain, _)| domain)
}

fn classify_pair(
    a: &NoteSummary,
    b: &NoteSummary,
    similarity: f32,
    config: &SemanticConfig,
) -> Option<(SemanticKind, f32)> {
    if similarity > config.highly_related {
        return Some((SemanticKind::HighlyRelated, 0.9));
    }
    if similarity > config.related_to {
        return Some((SemanticKind::RelatedTo, 0.7));
    }

    let title_a = a.title.to_lowercase();
    let title_b = b.title.to_lowercase();
    if title_a.contains(&title_b) || title_b.contains(&title_a) {
        return Some((SemanticKind::Contains, 0.8));
    }

    if let (Some(da), Some(db)) = (classify_domain(&a.keywords), classify_domain(&b.keywords)) {
        if da == db && similarity > config.same_domain {
            return Some((SemanticKind::SameDomain, 0.6));
        }
        if da != db && similarity > config.cross_domain {
            return Some((SemanticKind::CrossDomain, 0.7));
        }
    }

    let improves = |t: &str| t.contains("enhance") || t.contains("improve");
    if improves(&title_a) || improves(&title_b) {
        return Some((SemanticKind::Enhances, 0.6));
    }

    if similarity > config.loosely_related {
        return Some((SemanticKind::LooselyRelated, 0.5));
    }
    None
}

/// Relationships for every qualifying pair, in note order, capped at
/// `max_total`.
pub fn relate_notes(notes: &[NoteSummary], config: &SemanticConfig) -> Vec<SemanticRelationship> {
    let mut relationships = Vec::new();

    'pairs: for (i, a) in notes.iter().enumerate() {
        for b in &notes[i + 1..] {
            if a.keywords.is_empty() || b.keywords.is_empty() {
                continue;
            }
            let similarity = jaccard_similarity(&a.keywords, &b.keywords);
            if similarity < config.min_similarity {
                continue;
            }

            let mut candidates = Vec::new();
            if let Some((kind, confidence)) = classify_pair(a, b, similarity, config) {
                if confidence > config.min_confidence {
                    candidates.push((kind, confidence));
                }
            }
            if let (Some(ma), Some(mb)) = (a.modified, b.modified) {
                if (ma - mb).num_seconds().abs() < config.temporal_window_secs {
                    candidates.push((SemanticKind::TemporalProximity, 0.9));
                }
            }
            candidates.sort_by(|x, y| y.1.total_cmp(&x.1));

            let shared: Vec<String> = a.keywords.intersection(&b.keywords).cloned().collect();
            for (kind, confidence) in candidates.into_iter().take(config.max_per_pair) {
                if relationships.len() >= config.max_total {
                    break 'pairs;
                }
                relationships.push(SemanticRelationship {
                    from_note_id: a.note_id.clone(),
                    to_note_id: b.note_id.clone(),
                    kind,
                    confidence,
                    similarity,
                    shared_keywords: shared.clone(),
                });
            }
        }
    }

    relationships
}
