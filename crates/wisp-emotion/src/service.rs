// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! [`EmotionService`]: ties the hot-reload manager to the event bus,
//! publishing the `emotion.analysis.*` and `character.emotion_changed`
//! events synchronously so subscribers never race the analysis that
//! produced them (spec §4.1 `publish_sync`, §6 event namespace).

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::{json, Value};
use wisp_bus::EventBus;
use wisp_config::EmotionFilesConfig;

use crate::events::{analysis_completed_event, analysis_started_event, emotion_changed_event, rule_scored_event};
use crate::manager::{EmotionConfigManager, ManagerError};
use crate::pipeline::EmotionResult;
use crate::vad::Emotion;

/// Character id used when a caller (e.g. memory ingestion) has no specific
/// character context to analyze against.
pub const DEFAULT_CHARACTER: &str = "default";

pub struct EmotionService {
    manager: EmotionConfigManager,
    bus: std::sync::Arc<EventBus>,
    last_primary: Mutex<HashMap<String, Emotion>>,
}

impl EmotionService {
    pub fn new(data_dir: impl Into<std::path::PathBuf>, files: EmotionFilesConfig, bus: std::sync::Arc<EventBus>) -> Self {
        Self {
            manager: EmotionConfigManager::new(data_dir, files),
            bus,
            last_primary: Mutex::new(HashMap::new()),
        }
    }

    /// Analyzes `text` against `character`'s composed pipeline, publishing
    /// the started/scored/completed events inline and a
    /// `character.emotion_changed` event iff the primary emotion differs
    /// from the last call for this character (spec §4.7 "Scoring", §6).
    pub fn analyze(&self, character: &str, text: &str) -> Result<EmotionResult, ManagerError> {
        self.bus.publish_sync(analysis_started_event(character, text.len()));
        let pipeline = self.manager.get_pipeline(character)?;
        let result = pipeline.analyze(text);
        self.bus.publish_sync(rule_scored_event(character, "combined", result.scores.clone()));
        self.bus.publish_sync(analysis_completed_event(character, &result));
        self.emit_change_if_needed(character, &result);
        Ok(result)
    }

    fn emit_change_if_needed(&self, character: &str, result: &EmotionResult) {
        let mut last = self.last_primary.lock().expect("emotion state mutex poisoned");
        let previous = last.insert(character.to_string(), result.primary);
        if previous != Some(result.primary) {
            let from = previous.unwrap_or(Emotion::Neutral);
            self.bus
                .publish_sync(emotion_changed_event(character, from, result.primary, result.confidence));
        }
    }

    /// Renders an [`EmotionResult`] as the compact JSON snapshot the memory
    /// pipeline attaches to an ingested record (spec §4.6 "Ingestion" —
    /// `memory.emotional_snapshot.attached{record_id, session_id,
    /// emotion}"). Uses [`DEFAULT_CHARACTER`] since memory ingestion has no
    /// per-character context.
    pub fn snapshot_value(&self, text: &str) -> Option<Value> {
        let result = self.analyze(DEFAULT_CHARACTER, text).ok()?;
        Some(json!({
            "primary": result.primary,
            "confidence": result.confidence,
            "valence": result.vad.valence,
            "arousal": result.vad.arousal,
            "dominance": result.vad.dominance,
            "secondary": result.secondary.iter().map(|(e, s)| (e.to_string(), *s)).collect::<HashMap<String, f32>>(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn service() -> EmotionService {
        let dir = tempfile::tempdir().unwrap();
        EmotionService::new(dir.path(), EmotionFilesConfig::default(), Arc::new(EventBus::new(16)))
    }

    #[test]
    fn analyze_publishes_started_and_completed_events() {
        let dir = tempfile::tempdir().unwrap();
        let bus = Arc::new(EventBus::new(16));
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);
        bus.subscribe("emotion.analysis.*", move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        let svc = EmotionService::new(dir.path(), EmotionFilesConfig::default(), bus);
        svc.analyze("alice", "hello there").unwrap();
        // started + rule.scored + completed = 3
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn emotion_changed_fires_once_on_transition() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("emotion.yaml"),
            "lexicon:\n  keywords:\n    Happy:\n      sunny: 1.0\n    Sad:\n      rain: 1.0\n",
        )
        .unwrap();
        let bus = Arc::new(EventBus::new(16));
        let changes = Arc::new(AtomicUsize::new(0));
        let changes2 = Arc::clone(&changes);
        bus.subscribe("character.emotion_changed", move |_| {
            changes2.fetch_add(1, Ordering::SeqCst);
        });
        let svc = EmotionService::new(dir.path(), EmotionFilesConfig::default(), bus);

        svc.analyze("alice", "sunny").unwrap(); // Neutral -> Happy: change #1
        svc.analyze("alice", "sunny").unwrap(); // Happy -> Happy: no change
        svc.analyze("alice", "rain").unwrap(); // Happy -> Sad: change #2

        assert_eq!(changes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn snapshot_value_contains_primary_and_vad() {
        let svc = service();
        let snapshot = svc.snapshot_value("hello").unwrap();
        assert!(snapshot.get("primary").is_some());
        assert!(snapshot.get("valence").is_some());
    }
}
