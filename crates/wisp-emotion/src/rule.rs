// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Built-in rules and the [`Rule`] trait custom [`crate::PatternRule`]s
//! implement too (spec §4.7 "Rules").

use std::collections::HashMap;

use regex::Regex;

use crate::config::Lexicon;
use crate::vad::Emotion;

/// Flags set by one rule and read by a later one in the same analysis pass
/// (spec §4.7 "each may set flags read by later rules (e.g.
/// `negative_hint`)"). Reset at the start of every `analyze` call.
#[derive(Debug, Clone, Default)]
pub struct RuleFlags {
    pub positive_hint: bool,
    pub negative_hint: bool,
    pub negation_seen: bool,
    pub exclamation_count: u32,
    pub question_count: u32,
}

/// Per-call context threaded through the ordered rule list.
pub struct RuleContext<'a> {
    /// Lower-cased text, `<think>`/`<thinking>` blocks already stripped.
    pub text: &'a str,
    pub lexicon: &'a Lexicon,
    pub flags: &'a mut RuleFlags,
}

/// What one rule contributed this pass (spec §4.7 "Rules" —
/// `apply(context) → {scores, keywords, flags}`; `flags` live on
/// [`RuleContext`] instead of the output so later rules observe them
/// in-place rather than via an aggregated map).
#[derive(Debug, Clone, Default)]
pub struct RuleOutput {
    pub scores: HashMap<Emotion, f32>,
    pub keywords: Vec<String>,
}

impl RuleOutput {
    fn add(&mut self, emotion: Emotion, weight: f32, keyword: impl Into<String>) {
        *self.scores.entry(emotion).or_insert(0.0) += weight;
        self.keywords.push(keyword.into());
    }
}

/// A scoring rule. Built-ins and config-driven [`crate::PatternRule`]s
/// share this interface; the pipeline runs every enabled rule in ascending
/// `priority` order and sums their score maps.
pub trait Rule: Send + Sync {
    fn name(&self) -> &str;
    fn priority(&self) -> i32;
    fn apply(&self, ctx: &mut RuleContext) -> RuleOutput;
}

fn tokenize(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .collect()
}

/// Priority 10. Scans the lexicon's bare positive/negative hint words,
/// nudges Happy/Sad accordingly, and sets `flags.positive_hint` /
/// `flags.negative_hint` for later rules to read.
pub struct SentimentHintRule;

impl Rule for SentimentHintRule {
    fn name(&self) -> &str {
        "sentiment_hint"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn apply(&self, ctx: &mut RuleContext) -> RuleOutput {
        let mut out = RuleOutput::default();
        let tokens = tokenize(ctx.text);
        for tok in &tokens {
            let lower = tok.to_lowercase();
            if ctx.lexicon.positive_hints.iter().any(|h| h.eq_ignore_ascii_case(&lower)) {
                ctx.flags.positive_hint = true;
                out.add(Emotion::Happy, 0.5, lower.clone());
            }
            if ctx.lexicon.negative_hints.iter().any(|h| h.eq_ignore_ascii_case(&lower)) {
                ctx.flags.negative_hint = true;
                out.add(Emotion::Sad, 0.5, lower);
            }
        }
        out
    }
}

/// Priority 20. The lexicon keyword→weight scan. A keyword immediately
/// preceded by a negation word contributes nothing (spec's negation list);
/// preceded by an intensifier or diminisher, its weight is scaled.
pub struct KeywordRule;

impl Rule for KeywordRule {
    fn name(&self) -> &str {
        "keyword"
    }

    fn priority(&self) -> i32 {
        20
    }

    fn apply(&self, ctx: &mut RuleContext) -> RuleOutput {
        let mut out = RuleOutput::default();
        let tokens = tokenize(ctx.text);
        let lowered: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();

        for (i, word) in lowered.iter().enumerate() {
            for (emotion, words) in &ctx.lexicon.keywords {
                let Some(&base_weight) = words.get(word) else { continue };
                let prev = if i > 0 { Some(lowered[i - 1].as_str()) } else { None };

                if let Some(prev) = prev {
                    if ctx.lexicon.negations.iter().any(|n| n.eq_ignore_ascii_case(prev)) {
                        ctx.flags.negation_seen = true;
                        continue;
                    }
                }

                let mut weight = base_weight;
                if let Some(prev) = prev {
                    if let Some(mult) = ctx.lexicon.intensifiers.get(prev) {
                        weight *= mult;
                    } else if let Some(mult) = ctx.lexicon.diminishers.get(prev) {
                        weight *= mult;
                    }
                }
                out.add(*emotion, weight, word.clone());
            }
        }
        out
    }
}

/// Priority 30. Exclamation marks nudge Surprised (and Angry, if a
/// negative hint already fired this pass); question marks nudge Confused.
pub struct PunctuationRule;

impl Rule for PunctuationRule {
    fn name(&self) -> &str {
        "punctuation"
    }

    fn priority(&self) -> i32 {
        30
    }

    fn apply(&self, ctx: &mut RuleContext) -> RuleOutput {
        let mut out = RuleOutput::default();
        let bangs = ctx.text.matches('!').count() as u32;
        let questions = ctx.text.matches('?').count() as u32;
        ctx.flags.exclamation_count = bangs;
        ctx.flags.question_count = questions;

        if bangs > 0 {
            let n = bangs.min(3) as f32;
            out.add(Emotion::Surprised, 0.2 * n, "!");
            if ctx.flags.negative_hint {
                out.add(Emotion::Angry, 0.3 * n, "!");
            }
        }
        if questions > 0 {
            out.add(Emotion::Confused, 0.15 * questions.min(3) as f32, "?");
        }
        out
    }
}

const EMOTICONS: &[(&str, Emotion, f32)] = &[
    (":)", Emotion::Happy, 1.0),
    (":-)", Emotion::Happy, 1.0),
    (":d", Emotion::Happy, 1.2),
    ("xd", Emotion::Happy, 1.2),
    (";)", Emotion::Happy, 0.8),
    ("😀", Emotion::Happy, 1.0),
    ("😄", Emotion::Happy, 1.0),
    ("😂", Emotion::Happy, 1.0),
    ("🙂", Emotion::Happy, 0.7),
    (":(", Emotion::Sad, 1.0),
    (":-(", Emotion::Sad, 1.0),
    ("😢", Emotion::Sad, 1.0),
    ("😭", Emotion::Sad, 1.1),
    ("☹", Emotion::Sad, 0.9),
    (":/", Emotion::Confused, 0.8),
    (":-/", Emotion::Confused, 0.8),
    ("🤔", Emotion::Confused, 0.9),
    ("😕", Emotion::Confused, 0.8),
    ("😡", Emotion::Angry, 1.1),
    ("😠", Emotion::Angry, 1.0),
    (">:(", Emotion::Angry, 1.0),
    ("😱", Emotion::Fearful, 1.1),
    ("😨", Emotion::Fearful, 1.0),
    ("🤢", Emotion::Disgusted, 1.0),
    ("🤮", Emotion::Disgusted, 1.1),
    ("😲", Emotion::Surprised, 1.0),
    ("😮", Emotion::Surprised, 0.9),
];

/// Priority 40. A small built-in emoticon/emoji table.
pub struct EmoticonRule;

impl Rule for EmoticonRule {
    fn name(&self) -> &str {
        "emoticon"
    }

    fn priority(&self) -> i32 {
        40
    }

    fn apply(&self, ctx: &mut RuleContext) -> RuleOutput {
        let mut out = RuleOutput::default();
        let lower = ctx.text.to_lowercase();
        for (token, emotion, weight) in EMOTICONS {
            let count = lower.matches(token).count();
            if count > 0 {
                out.add(*emotion, weight * count as f32, *token);
            }
        }
        out
    }
}

/// Adapts a config-declared [`crate::PatternRule`] to the [`Rule`]
/// interface. Constructed once per rebuild; an invalid regex falls back to
/// never matching (logged by the manager at build time, not here).
pub struct CompiledPatternRule {
    name: String,
    emotion: Emotion,
    priority: i32,
    weight: f32,
    matcher: Matcher,
}

enum Matcher {
    Regex(Regex),
    Substring(String),
    Never,
}

impl CompiledPatternRule {
    pub fn compile(rule: &crate::config::PatternRule) -> Self {
        let matcher = match rule.kind {
            crate::config::PatternKind::Regex => match Regex::new(&rule.pattern) {
                Ok(re) => Matcher::Regex(re),
                Err(_) => Matcher::Never,
            },
            crate::config::PatternKind::Substring => Matcher::Substring(rule.pattern.to_lowercase()),
        };
        Self {
            name: rule.name.clone(),
            emotion: rule.emotion,
            priority: rule.priority,
            weight: rule.weight,
            matcher,
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self.matcher, Matcher::Never)
    }
}

impl Rule for CompiledPatternRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn apply(&self, ctx: &mut RuleContext) -> RuleOutput {
        let mut out = RuleOutput::default();
        let matched = match &self.matcher {
            Matcher::Regex(re) => re.is_match(ctx.text),
            Matcher::Substring(needle) => ctx.text.to_lowercase().contains(needle.as_str()),
            Matcher::Never => false,
        };
        if matched {
            out.add(self.emotion, self.weight, self.name.clone());
        }
        out
    }
}
