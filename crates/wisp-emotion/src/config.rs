// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! [`EmotionConfig`]: the lexicon and rule list that parameterize the
//! pipeline, plus the ordered overlay compose used by the hot-reload
//! manager (spec §3 "EmotionConfig", §4.7 "Hot-reload manager").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::vad::Emotion;

/// Keyword→weight per emotion, plus the modifier word lists the built-in
/// rules consult (spec §3 "EmotionConfig").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lexicon {
    /// Per-emotion keyword → weight. Keys are matched case-insensitively;
    /// stored lower-cased so lookups never re-lowercase at scoring time.
    #[serde(default)]
    pub keywords: HashMap<Emotion, HashMap<String, f32>>,
    /// Words that multiply the score of whatever keyword they precede
    /// (e.g. "very", "extremely" → 1.5).
    #[serde(default)]
    pub intensifiers: HashMap<String, f32>,
    /// Words that shrink the score of whatever keyword they precede
    /// (e.g. "slightly", "a bit" → 0.5).
    #[serde(default)]
    pub diminishers: HashMap<String, f32>,
    /// Words that flip a hint's polarity when immediately preceding it
    /// (e.g. "not", "never").
    #[serde(default)]
    pub negations: Vec<String>,
    /// Bare sentiment-hint words that nudge positive emotions, consulted by
    /// [`crate::SentimentHintRule`].
    #[serde(default)]
    pub positive_hints: Vec<String>,
    /// Bare sentiment-hint words that nudge negative emotions.
    #[serde(default)]
    pub negative_hints: Vec<String>,
}

impl Lexicon {
    /// Case-insensitively merges `other` into `self`, `other` winning on
    /// overlapping keys within the same emotion's keyword map; list fields
    /// (intensifiers, diminishers, negations, hints) are union-deduped,
    /// case-insensitively, `other`'s weight winning for map fields (spec
    /// §4.7 "Hot-reload manager": "keyword maps merge by case-insensitive
    /// keyword key").
    fn merge(&mut self, other: Lexicon) {
        for (emotion, words) in other.keywords {
            let entry = self.keywords.entry(emotion).or_default();
            for (word, weight) in words {
                entry.insert(word.to_lowercase(), weight);
            }
        }
        merge_weight_map(&mut self.intensifiers, other.intensifiers);
        merge_weight_map(&mut self.diminishers, other.diminishers);
        merge_word_list(&mut self.negations, other.negations);
        merge_word_list(&mut self.positive_hints, other.positive_hints);
        merge_word_list(&mut self.negative_hints, other.negative_hints);
    }
}

fn merge_weight_map(dst: &mut HashMap<String, f32>, src: HashMap<String, f32>) {
    for (word, weight) in src {
        dst.insert(word.to_lowercase(), weight);
    }
}

fn merge_word_list(dst: &mut Vec<String>, src: Vec<String>) {
    for word in src {
        let lower = word.to_lowercase();
        if !dst.iter().any(|w| w.to_lowercase() == lower) {
            dst.push(word);
        }
    }
}

/// How a [`PatternRule`]'s `pattern` field is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Regex,
    Substring,
}

/// A custom rule injected from configuration (spec §4.7 "Rules" — "Custom
/// `PatternRule`s (regex or substring) are injected from configuration with
/// explicit priorities").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternRule {
    pub name: String,
    pub emotion: Emotion,
    pub pattern: String,
    #[serde(default = "default_pattern_kind")]
    pub kind: PatternKind,
    pub weight: f32,
    pub priority: i32,
    #[serde(default = "super_default_true")]
    pub enabled: bool,
}

fn default_pattern_kind() -> PatternKind {
    PatternKind::Substring
}

fn super_default_true() -> bool {
    true
}

/// The composed configuration handed to a built [`crate::EmotionPipeline`]:
/// a lexicon plus the enabled custom pattern rules, both already overlaid
/// (spec §3 "EmotionConfig").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmotionConfig {
    #[serde(default)]
    pub lexicon: Lexicon,
    /// Disabled/custom patterns declared across the overlay chain.
    /// Disabled rules are dropped when a pipeline is built from this config,
    /// not at parse time, so a later layer can still observe and re-enable
    /// an earlier layer's rule by name.
    #[serde(default)]
    pub rules: Vec<PatternRule>,
}

impl EmotionConfig {
    /// Applies `overlay` on top of `self`: lexicon keyword maps merge
    /// case-insensitively (overlay wins), modifier lists union-dedup, and
    /// rules are merged by `name` — an overlay rule with the same name as
    /// an earlier one replaces it in place (preserving relative order so a
    /// later layer can flip a rule's `enabled` without reshuffling
    /// priority-sorted output); new-named rules are appended (spec §4.7
    /// "composes them by overlay … later overrides earlier; lists are
    /// union-deduped").
    pub fn overlay(mut self, overlay: EmotionConfig) -> EmotionConfig {
        self.lexicon.merge(overlay.lexicon);
        for rule in overlay.rules {
            if let Some(existing) = self.rules.iter_mut().find(|r| r.name == rule.name) {
                *existing = rule;
            } else {
                self.rules.push(rule);
            }
        }
        self
    }

    /// Enabled custom rules only, the form [`crate::EmotionPipeline`]
    /// consumes.
    pub fn enabled_rules(&self) -> Vec<PatternRule> {
        self.rules.iter().filter(|r| r.enabled).cloned().collect()
    }
}
