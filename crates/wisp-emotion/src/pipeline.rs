// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! [`EmotionPipeline`]: the ordered rule list and the `analyze` scoring
//! procedure (spec §3 "EmotionPipeline", §4.7 "Scoring").

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::config::{EmotionConfig, Lexicon};
use crate::rule::{CompiledPatternRule, EmoticonRule, KeywordRule, PunctuationRule, Rule, RuleContext, RuleFlags, SentimentHintRule};
use crate::vad::{Emotion, Vad};

fn think_tag_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<think(?:ing)?>.*?</think(?:ing)?>").expect("static think-tag regex")
    })
}

/// Strips `<think>…</think>` / `<thinking>…</thinking>` blocks
/// case-insensitively across newlines (spec §4.7 step 1).
pub fn strip_think_blocks(text: &str) -> String {
    think_tag_pattern().replace_all(text, "").into_owned()
}

/// Secondary emotions are included if their normalized score is at least
/// this fraction of the total (spec §4.7 step 6).
const SECONDARY_THRESHOLD: f32 = 0.18;

/// The result of one `analyze` call (spec §4.7 "Scoring", §3 "VAD").
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionResult {
    /// The argmax emotion after [`Emotion::output_mapped`] re-targeting.
    pub primary: Emotion,
    /// Other emotions whose normalized share is ≥ 0.18, excluding primary.
    pub secondary: Vec<(Emotion, f32)>,
    /// Normalized per-emotion scores (sum to 1.0, or empty if nothing scored).
    pub scores: HashMap<Emotion, f32>,
    pub vad: Vad,
    pub confidence: f32,
    pub keywords: Vec<String>,
    pub flags: RuleFlags,
}

/// An ordered list of rules — built-ins plus config-driven pattern rules —
/// that together turn text into an [`EmotionResult`] (spec §4.7).
pub struct EmotionPipeline {
    rules: Vec<Box<dyn Rule>>,
    lexicon: Lexicon,
}

impl EmotionPipeline {
    /// Builds a pipeline from a composed [`EmotionConfig`]: the four
    /// built-in rules plus one [`CompiledPatternRule`] per enabled custom
    /// rule, all sorted ascending by priority (spec §4.7 "Rules execute in
    /// ascending priority order").
    pub fn from_config(config: &EmotionConfig) -> Self {
        let mut rules: Vec<Box<dyn Rule>> = vec![
            Box::new(SentimentHintRule),
            Box::new(KeywordRule),
            Box::new(PunctuationRule),
            Box::new(EmoticonRule),
        ];
        for pattern in config.enabled_rules() {
            let compiled = CompiledPatternRule::compile(&pattern);
            if !compiled.is_valid() {
                warn!(rule = %pattern.name, pattern = %pattern.pattern, "emotion rule has invalid pattern, will never match");
            }
            rules.push(Box::new(compiled));
        }
        rules.sort_by_key(|r| r.priority());
        Self { rules, lexicon: config.lexicon.clone() }
    }

    /// Runs every rule over `text` and produces the final [`EmotionResult`]
    /// (spec §4.7 "Scoring" steps 1-6). Pure function of `(text, self)` —
    /// the same inputs always yield the same primary/secondary/VAD (spec
    /// §8 "Emotion determinism").
    pub fn analyze(&self, text: &str) -> EmotionResult {
        let stripped = strip_think_blocks(text);
        let lowered = stripped.to_lowercase();

        let mut flags = RuleFlags::default();
        let mut totals: HashMap<Emotion, f32> = HashMap::new();
        let mut keywords = Vec::new();

        for rule in &self.rules {
            let mut ctx = RuleContext { text: &lowered, lexicon: &self.lexicon, flags: &mut flags };
            let out = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| rule.apply(&mut ctx))) {
                Ok(out) => out,
                Err(_) => {
                    warn!(rule = %rule.name(), "emotion rule panicked, contributing zero");
                    continue;
                }
            };
            for (emotion, score) in out.scores {
                *totals.entry(emotion).or_insert(0.0) += score;
            }
            keywords.extend(out.keywords);
        }

        totals.retain(|_, score| *score > 0.0);

        let total: f32 = totals.values().sum();
        if total <= 0.0 {
            return EmotionResult {
                primary: Emotion::Neutral,
                secondary: Vec::new(),
                scores: HashMap::new(),
                vad: Vad::weighted(&[(Emotion::Neutral, 1.0)]),
                confidence: 0.3,
                keywords,
                flags,
            };
        }

        let normalized: HashMap<Emotion, f32> =
            totals.iter().map(|(e, s)| (*e, s / total)).collect();

        let (&raw_primary, &primary_share) = normalized
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .expect("non-empty after total>0 check");

        let confidence = (0.35 + 0.65 * primary_share * (total / 3.0).min(1.0)).clamp(0.3, 0.95);

        let primary = raw_primary.output_mapped();

        let mut secondary: Vec<(Emotion, f32)> = normalized
            .iter()
            .filter(|(e, s)| **e != raw_primary && **s >= SECONDARY_THRESHOLD)
            .map(|(e, s)| (*e, *s))
            .collect();
        secondary.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

        let weighted: Vec<(Emotion, f32)> = normalized.iter().map(|(e, s)| (*e, *s)).collect();
        let vad = Vad::weighted(&weighted);

        EmotionResult {
            primary,
            secondary,
            scores: normalized,
            vad,
            confidence,
            keywords,
            flags,
        }
    }
}
