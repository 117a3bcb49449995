// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Ties ingestion, extraction, the layered stores, and recall together
//! (spec §4.6). Consistency model: ingestion publishes `memory.recorded`
//! before extraction completes, so consumers may observe it before the
//! layer-update events; layer events always follow the record event for
//! the same `record_id`.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::warn;
use wisp_bus::{Event, EventBus};
use wisp_config::MemoryConfig;

use crate::extractor::Extractor;
use crate::record::{LayerUpdate, MemoryRecord, MemoryResult};
use crate::scorer::ScorerRegistry;
use crate::store::MemoryStore;

const SOURCE: &str = "memory-pipeline";

/// Attaches an emotion reading to a freshly ingested record's content.
/// Implemented by the emotion pipeline crate so this crate never depends
/// on it directly (the same trait-at-the-seam pattern the orchestrator
/// uses for `MemoryRecall`/`SkillRecall`).
#[async_trait]
pub trait EmotionSnapshot: Send + Sync {
    async fn snapshot(&self, text: &str) -> Option<Value>;
}

pub struct MemoryPipeline {
    store: Arc<MemoryStore>,
    bus: Arc<EventBus>,
    extractors: Vec<Arc<dyn Extractor>>,
    scorers: ScorerRegistry,
    emotion: Option<Arc<dyn EmotionSnapshot>>,
    default_top_k: usize,
    emotion_on_ingest: bool,
}

impl MemoryPipeline {
    pub fn new(store: Arc<MemoryStore>, bus: Arc<EventBus>, cfg: &MemoryConfig) -> Self {
        Self {
            store,
            bus,
            extractors: Vec::new(),
            scorers: ScorerRegistry::default(),
            emotion: None,
            default_top_k: cfg.recall_top_k,
            emotion_on_ingest: cfg.emotion_on_ingest,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    pub fn with_emotion_snapshot(mut self, emotion: Arc<dyn EmotionSnapshot>) -> Self {
        self.emotion = Some(emotion);
        self
    }

    /// Appends a record, publishes `memory.recorded`, optionally attaches
    /// an emotion snapshot, then runs extraction (spec §4.6 "Ingestion").
    pub async fn ingest(
        &self,
        session_id: impl Into<String>,
        role: impl Into<String>,
        content: impl Into<String>,
        metadata: Map<String, Value>,
    ) -> Result<MemoryRecord, crate::store::StoreError> {
        let record = MemoryRecord::new(session_id, role, content, metadata);
        self.store.insert_record(&record).await?;
        self.bus
            .publish(Event::with_payload(
                "memory.recorded",
                SOURCE,
                json!({ "record_id": record.id, "session_id": record.session_id }),
            ))
            .await;

        if self.emotion_on_ingest {
            if let Some(emotion) = &self.emotion {
                if let Some(snapshot) = emotion.snapshot(&record.content).await {
                    self.bus
                        .publish(Event::with_payload(
                            "memory.emotional_snapshot.attached",
                            SOURCE,
                            json!({ "record_id": record.id, "snapshot": snapshot }),
                        ))
                        .await;
                }
            }
        }

        self.extract_and_apply(&record).await;
        Ok(record)
    }

    async fn extract_and_apply(&self, record: &MemoryRecord) {
        for extractor in &self.extractors {
            for update in extractor.extract(record).await {
                self.apply_update(update).await;
            }
        }
    }

    async fn apply_update(&self, update: LayerUpdate) {
        let now = Utc::now();
        match update {
            LayerUpdate::CoreProfile { summary, profile_id } => {
                let id = profile_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                if let Err(e) = self.store.upsert_core_profile(&id, &summary, now).await {
                    warn!(error = %e, "core profile upsert failed");
                    return;
                }
                self.bus
                    .publish(Event::with_payload(
                        "memory.core.updated",
                        SOURCE,
                        json!({ "profile_id": id }),
                    ))
                    .await;
            }
            LayerUpdate::SemanticFact { subject, predicate, object, fact_id } => {
                let id = fact_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                if let Err(e) = self
                    .store
                    .upsert_semantic_fact(&id, &subject, &predicate, &object, now)
                    .await
                {
                    warn!(error = %e, "semantic fact upsert failed");
                    return;
                }
                self.bus
                    .publish(Event::with_payload(
                        "memory.fact.upserted",
                        SOURCE,
                        json!({
                            "fact_id": id,
                            "subject": subject,
                            "predicate": predicate,
                            "object": object,
                        }),
                    ))
                    .await;
            }
            LayerUpdate::ProceduralHabit { task_type, instruction, habit_id } => {
                let id = habit_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                if let Err(e) = self
                    .store
                    .upsert_procedural_habit(&id, &task_type, &instruction, now)
                    .await
                {
                    warn!(error = %e, "procedural habit upsert failed");
                    return;
                }
                self.bus
                    .publish(Event::with_payload(
                        "memory.habit.recorded",
                        SOURCE,
                        json!({ "habit_id": id }),
                    ))
                    .await;
            }
        }
    }

    /// Ranked recall over ingested records (spec §4.6 "Recall"). `None`
    /// session scope searches across all sessions.
    pub async fn recall(&self, query: &str, session_id: Option<&str>, top_k: usize) -> Vec<MemoryResult> {
        let records = match self.store.list_records(session_id).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "memory recall failed to read record log");
                return Vec::new();
            }
        };

        let mut scored: Vec<MemoryResult> = records
            .into_iter()
            .map(|record| {
                let score = self.scorers.score(query, &record);
                MemoryResult { record, score }
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(top_k);
        scored
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// Renders a recall result set into the compact prompt block the
    /// context builder inserts (spec §4.6 "Recall").
    pub async fn render_recall_block(&self, query: &str, session_id: &str, top_k: usize) -> Option<String> {
        let results = self.recall(query, Some(session_id), top_k).await;
        if results.is_empty() {
            return None;
        }
        let mut block = String::from("Relevant memory:\n");
        for result in results {
            block.push_str(&format!("- ({}) {}\n", result.record.role, result.record.content));
        }
        Some(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wisp_config::MemoryConfig;

    fn pipeline() -> MemoryPipeline {
        let store = Arc::new(MemoryStore::open_in_memory().unwrap());
        let bus = Arc::new(EventBus::new(16));
        MemoryPipeline::new(store, bus, &MemoryConfig::default())
    }

    #[tokio::test]
    async fn ingest_stores_a_record() {
        let pipeline = pipeline();
        let record = pipeline.ingest("s1", "user", "hello", Map::new()).await.unwrap();
        let recalled = pipeline.recall("hello", Some("s1"), 5).await;
        assert_eq!(recalled.len(), 1);
        assert_eq!(recalled[0].record.id, record.id);
    }

    /// Spec §8 "Memory layering": for a record whose metadata contains a
    /// fact update, exactly one `memory.fact.upserted` event is emitted
    /// with matching subject/predicate/object.
    #[tokio::test]
    async fn fact_hint_emits_exactly_one_matching_fact_upserted_event() {
        use crate::extractor::RuleExtractor;

        let store = Arc::new(MemoryStore::open_in_memory().unwrap());
        let bus = Arc::new(EventBus::new(16));
        bus.start().await;

        let seen: Arc<std::sync::Mutex<Vec<Value>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        bus.subscribe("memory.fact.upserted", move |event| {
            seen2.lock().unwrap().push(Value::Object(event.data.clone()));
        });

        let pipeline = MemoryPipeline::new(Arc::clone(&store), Arc::clone(&bus), &MemoryConfig::default())
            .with_extractor(Arc::new(RuleExtractor));
        let mut metadata = Map::new();
        metadata.insert(
            "facts".into(),
            serde_json::json!([{"subject": "user", "predicate": "likes", "object": "rust"}]),
        );
        pipeline.ingest("s1", "user", "I like rust", metadata).await.unwrap();
        bus.wait_empty().await;

        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 1, "exactly one memory.fact.upserted event");
        assert_eq!(events[0]["subject"], "user");
        assert_eq!(events[0]["predicate"], "likes");
        assert_eq!(events[0]["object"], "rust");
        bus.stop().await;
    }

    #[tokio::test]
    async fn recall_ranks_by_keyword_overlap() {
        let pipeline = pipeline();
        pipeline.ingest("s1", "user", "I enjoy hiking in the mountains", Map::new()).await.unwrap();
        pipeline.ingest("s1", "user", "rust is a great programming language", Map::new()).await.unwrap();
        let results = pipeline.recall("rust programming", Some("s1"), 5).await;
        assert_eq!(results[0].record.content, "rust is a great programming language");
    }

    #[tokio::test]
    async fn render_recall_block_is_none_when_nothing_ingested() {
        let pipeline = pipeline();
        assert!(pipeline.render_recall_block("anything", "s1", 5).await.is_none());
    }
}
