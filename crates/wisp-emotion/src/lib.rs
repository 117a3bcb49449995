// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Rule-based emotion analysis pipeline with a hot-reloadable, per-character
//! configuration chain (spec §3 "EmotionConfig"/"EmotionPipeline", §4.7).

mod config;
mod events;
mod manager;
mod pipeline;
mod rule;
mod service;
mod vad;

pub use config::{EmotionConfig, Lexicon, PatternKind, PatternRule};
pub use events::{
    analysis_completed_event, analysis_started_event, emotion_changed_event, rule_scored_event,
    CHARACTER_EMOTION_CHANGED, EMOTION_ANALYSIS_COMPLETED, EMOTION_ANALYSIS_RULE_SCORED, EMOTION_ANALYSIS_STARTED,
};
pub use manager::{EmotionConfigManager, ManagerError};
pub use pipeline::{EmotionPipeline, EmotionResult};
pub use rule::{EmoticonRule, KeywordRule, PunctuationRule, Rule, RuleContext, RuleFlags, RuleOutput, SentimentHintRule};
pub use service::{EmotionService, DEFAULT_CHARACTER};
pub use vad::{Emotion, Vad, ALL_EMOTIONS};
