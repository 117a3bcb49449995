// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Composable recall scorers (spec §4.6 "Recall").

use std::collections::HashSet;

use chrono::Utc;

use crate::record::MemoryRecord;

/// Scores how relevant `record` is to `query`. Implementations are pure
/// functions of their inputs so they compose by summation in
/// [`ScorerRegistry`].
pub trait Scorer: Send + Sync {
    fn score(&self, query: &str, record: &MemoryRecord) -> f32;
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Fraction of query tokens also present in the record content.
#[derive(Debug, Default)]
pub struct KeywordOverlapScorer;

impl Scorer for KeywordOverlapScorer {
    fn score(&self, query: &str, record: &MemoryRecord) -> f32 {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return 0.0;
        }
        let content_tokens = tokenize(&record.content);
        let overlap = query_tokens.intersection(&content_tokens).count();
        overlap as f32 / query_tokens.len() as f32
    }
}

/// Decays toward 0 as the record ages; 1.0 for a record from this instant,
/// halving every `half_life_hours`.
#[derive(Debug, Clone)]
pub struct RecencyScorer {
    pub half_life_hours: f32,
}

impl Default for RecencyScorer {
    fn default() -> Self {
        Self { half_life_hours: 24.0 }
    }
}

impl Scorer for RecencyScorer {
    fn score(&self, _query: &str, record: &MemoryRecord) -> f32 {
        let age_hours = (Utc::now() - record.timestamp).num_seconds().max(0) as f32 / 3600.0;
        0.5f32.powf(age_hours / self.half_life_hours)
    }
}

/// Weighted sum of an arbitrary set of scorers.
pub struct ScorerRegistry {
    scorers: Vec<(f32, Box<dyn Scorer>)>,
}

impl ScorerRegistry {
    pub fn new() -> Self {
        Self { scorers: Vec::new() }
    }

    pub fn with_scorer(mut self, weight: f32, scorer: Box<dyn Scorer>) -> Self {
        self.scorers.push((weight, scorer));
        self
    }

    pub fn score(&self, query: &str, record: &MemoryRecord) -> f32 {
        self.scorers
            .iter()
            .map(|(weight, scorer)| weight * scorer.score(query, record))
            .sum()
    }
}

impl Default for ScorerRegistry {
    /// Keyword overlap weighted 0.7, recency weighted 0.3 — relevance leads,
    /// recency breaks ties among equally relevant records.
    fn default() -> Self {
        Self::new()
            .with_scorer(0.7, Box::new(KeywordOverlapScorer))
            .with_scorer(0.3, Box::new(RecencyScorer::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn record(content: &str) -> MemoryRecord {
        MemoryRecord::new("s1", "user", content, Map::new())
    }

    #[test]
    fn keyword_overlap_scores_full_match_as_one() {
        let scorer = KeywordOverlapScorer;
        assert_eq!(scorer.score("rust programming", &record("I love rust programming")), 1.0);
    }

    #[test]
    fn keyword_overlap_scores_no_match_as_zero() {
        let scorer = KeywordOverlapScorer;
        assert_eq!(scorer.score("python", &record("I love rust")), 0.0);
    }

    #[test]
    fn recency_scores_fresh_record_near_one() {
        let scorer = RecencyScorer::default();
        assert!(scorer.score("", &record("fresh")) > 0.99);
    }

    #[test]
    fn registry_combines_scorers() {
        let registry = ScorerRegistry::default();
        let score = registry.score("rust", &record("I love rust"));
        assert!(score > 0.0);
    }
}
