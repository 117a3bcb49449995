// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Emotion-namespace events published on the bus (spec §6 event namespace:
//! `emotion.analysis.{started|rule.scored|completed}`,
//! `character.emotion_changed`).

use serde::Serialize;
use wisp_bus::Event;

use crate::pipeline::EmotionResult;
use crate::vad::Emotion;

pub const EMOTION_ANALYSIS_STARTED: &str = "emotion.analysis.started";
pub const EMOTION_ANALYSIS_RULE_SCORED: &str = "emotion.analysis.rule.scored";
pub const EMOTION_ANALYSIS_COMPLETED: &str = "emotion.analysis.completed";
pub const CHARACTER_EMOTION_CHANGED: &str = "character.emotion_changed";

const SOURCE: &str = "emotion-pipeline";

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisStartedPayload {
    pub character: String,
    pub text_len: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleScoredPayload {
    pub character: String,
    pub rule: String,
    pub scores: std::collections::HashMap<Emotion, f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisCompletedPayload {
    pub character: String,
    pub primary: Emotion,
    pub confidence: f32,
    pub valence: f32,
    pub arousal: f32,
    pub dominance: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmotionChangedPayload {
    pub character: String,
    pub from_state: Emotion,
    pub to_state: Emotion,
    pub intensity: f32,
}

pub fn analysis_started_event(character: impl Into<String>, text_len: usize) -> Event {
    Event::with_payload(
        EMOTION_ANALYSIS_STARTED,
        SOURCE,
        AnalysisStartedPayload { character: character.into(), text_len },
    )
}

pub fn rule_scored_event(
    character: impl Into<String>,
    rule: impl Into<String>,
    scores: std::collections::HashMap<Emotion, f32>,
) -> Event {
    Event::with_payload(
        EMOTION_ANALYSIS_RULE_SCORED,
        SOURCE,
        RuleScoredPayload { character: character.into(), rule: rule.into(), scores },
    )
}

pub fn analysis_completed_event(character: impl Into<String>, result: &EmotionResult) -> Event {
    Event::with_payload(
        EMOTION_ANALYSIS_COMPLETED,
        SOURCE,
        AnalysisCompletedPayload {
            character: character.into(),
            primary: result.primary,
            confidence: result.confidence,
            valence: result.vad.valence,
            arousal: result.vad.arousal,
            dominance: result.vad.dominance,
        },
    )
}

pub fn emotion_changed_event(
    character: impl Into<String>,
    from_state: Emotion,
    to_state: Emotion,
    intensity: f32,
) -> Event {
    Event::with_payload(
        CHARACTER_EMOTION_CHANGED,
        SOURCE,
        EmotionChangedPayload { character: character.into(), from_state, to_state, intensity },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_event_carries_primary_and_vad() {
        let pipeline = crate::EmotionPipeline::from_config(&crate::EmotionConfig::default());
        let result = pipeline.analyze("hello");
        let ev = analysis_completed_event("alice", &result);
        assert_eq!(ev.event_type, EMOTION_ANALYSIS_COMPLETED);
        assert_eq!(ev.data.get("character").unwrap(), "alice");
    }

    #[test]
    fn emotion_changed_event_carries_transition() {
        let ev = emotion_changed_event("alice", Emotion::Neutral, Emotion::Happy, 0.7);
        assert_eq!(ev.data.get("from_state").unwrap(), "NEUTRAL");
        assert_eq!(ev.data.get("to_state").unwrap(), "HAPPY");
    }
}
