// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Extractor strategies turning a record into zero or more layer updates
//! (spec §4.6 "Extraction").

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use wisp_model::{CompletionRequest, Message, ModelProvider};

use crate::record::{LayerUpdate, MemoryRecord};

#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, record: &MemoryRecord) -> Vec<LayerUpdate>;
}

/// Mines explicit hints left in `record.metadata` under the keys
/// `core_updates`, `facts`, `habits`. A tool or caller that already knows
/// the structured update it wants attaches it directly rather than paying
/// for an LLM round trip.
#[derive(Debug, Default)]
pub struct RuleExtractor;

#[derive(Debug, Deserialize)]
struct CoreUpdateHint {
    summary: String,
    #[serde(default)]
    profile_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FactHint {
    subject: String,
    predicate: String,
    object: String,
    #[serde(default)]
    fact_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HabitHint {
    task_type: String,
    instruction: String,
    #[serde(default)]
    habit_id: Option<String>,
}

#[async_trait]
impl Extractor for RuleExtractor {
    async fn extract(&self, record: &MemoryRecord) -> Vec<LayerUpdate> {
        let mut updates = Vec::new();

        if let Some(Value::Array(items)) = record.metadata.get("core_updates") {
            for item in items {
                match serde_json::from_value::<CoreUpdateHint>(item.clone()) {
                    Ok(hint) => updates.push(LayerUpdate::CoreProfile {
                        summary: hint.summary,
                        profile_id: hint.profile_id,
                    }),
                    Err(e) => warn!(error = %e, "malformed core_updates hint; skipped"),
                }
            }
        }

        if let Some(Value::Array(items)) = record.metadata.get("facts") {
            for item in items {
                match serde_json::from_value::<FactHint>(item.clone()) {
                    Ok(hint) => updates.push(LayerUpdate::SemanticFact {
                        subject: hint.subject,
                        predicate: hint.predicate,
                        object: hint.object,
                        fact_id: hint.fact_id,
                    }),
                    Err(e) => warn!(error = %e, "malformed facts hint; skipped"),
                }
            }
        }

        if let Some(Value::Array(items)) = record.metadata.get("habits") {
            for item in items {
                match serde_json::from_value::<HabitHint>(item.clone()) {
                    Ok(hint) => updates.push(LayerUpdate::ProceduralHabit {
                        task_type: hint.task_type,
                        instruction: hint.instruction,
                        habit_id: hint.habit_id,
                    }),
                    Err(e) => warn!(error = %e, "malformed habits hint; skipped"),
                }
            }
        }

        updates
    }
}

#[derive(Debug, Deserialize, Default)]
struct LlmExtractionPayload {
    #[serde(default)]
    core_updates: Vec<CoreUpdateHint>,
    #[serde(default)]
    facts: Vec<FactHint>,
    #[serde(default)]
    habits: Vec<HabitHint>,
}

const EXTRACTION_SYSTEM_PROMPT: &str = r#"You extract durable memory updates from one conversation turn.
Respond with a single JSON object only, no commentary:
{"core_updates": [{"summary": "...", "profile_id": "..."}],
 "facts": [{"subject": "...", "predicate": "...", "object": "...", "fact_id": "..."}],
 "habits": [{"task_type": "...", "instruction": "...", "habit_id": "..."}]}
Every field is optional; omit arrays with nothing to report. Never include anything other than the JSON object."#;

/// Submits the record's content to a provider and parses a strict JSON
/// schema out of the reply, tolerating a ```json fenced block and ignoring
/// any surrounding commentary (spec §4.6 "LLM extractor").
pub struct LlmExtractor {
    provider: Arc<dyn ModelProvider>,
}

impl LlmExtractor {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self { provider }
    }
}

/// Strips a leading/trailing ``` fence (optionally tagged `json`) and
/// returns the span most likely to be the JSON object, tolerating
/// commentary before or after it.
fn extract_json_object(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let fenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.strip_suffix("```").unwrap_or(s))
        .unwrap_or(trimmed);
    let start = fenced.find('{')?;
    let end = fenced.rfind('}')?;
    if end < start {
        return None;
    }
    Some(fenced[start..=end].trim())
}

#[async_trait]
impl Extractor for LlmExtractor {
    async fn extract(&self, record: &MemoryRecord) -> Vec<LayerUpdate> {
        let request = CompletionRequest {
            messages: vec![
                Message::system(EXTRACTION_SYSTEM_PROMPT),
                Message::user(format!("role: {}\ncontent: {}", record.role, record.content)),
            ],
            ..CompletionRequest::default()
        };

        let reply = match self.provider.chat(request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "memory extraction provider call failed; no updates");
                return Vec::new();
            }
        };

        let Some(json_span) = extract_json_object(&reply.text) else {
            debug!(text = %reply.text, "no JSON object found in extraction reply");
            return Vec::new();
        };

        let payload: LlmExtractionPayload = match serde_json::from_str(json_span) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, json = %json_span, "malformed extraction JSON; no updates");
                return Vec::new();
            }
        };

        let mut updates = Vec::new();
        updates.extend(payload.core_updates.into_iter().map(|h| LayerUpdate::CoreProfile {
            summary: h.summary,
            profile_id: h.profile_id,
        }));
        updates.extend(payload.facts.into_iter().map(|h| LayerUpdate::SemanticFact {
            subject: h.subject,
            predicate: h.predicate,
            object: h.object,
            fact_id: h.fact_id,
        }));
        updates.extend(payload.habits.into_iter().map(|h| LayerUpdate::ProceduralHabit {
            task_type: h.task_type,
            instruction: h.instruction,
            habit_id: h.habit_id,
        }));
        updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};
    use wisp_model::ScriptedMockProvider;

    fn record_with_metadata(metadata: Map<String, Value>) -> MemoryRecord {
        MemoryRecord::new("s1", "user", "hi", metadata)
    }

    #[tokio::test]
    async fn rule_extractor_reads_all_three_hint_kinds() {
        let mut metadata = Map::new();
        metadata.insert("core_updates".into(), json!([{"summary": "likes rust"}]));
        metadata.insert("facts".into(), json!([{"subject": "user", "predicate": "likes", "object": "rust"}]));
        metadata.insert("habits".into(), json!([{"task_type": "review", "instruction": "be terse"}]));

        let updates = RuleExtractor.extract(&record_with_metadata(metadata)).await;
        assert_eq!(updates.len(), 3);
    }

    #[tokio::test]
    async fn rule_extractor_skips_malformed_hints() {
        let mut metadata = Map::new();
        metadata.insert("facts".into(), json!([{"subject": "user"}]));
        let updates = RuleExtractor.extract(&record_with_metadata(metadata)).await;
        assert!(updates.is_empty());
    }

    #[test]
    fn extract_json_object_tolerates_fence_and_commentary() {
        let raw = "Sure, here you go:\n```json\n{\"facts\": []}\n```\nLet me know if you need more.";
        assert_eq!(extract_json_object(raw), Some("{\"facts\": []}"));
    }

    #[test]
    fn extract_json_object_handles_bare_object() {
        let raw = "{\"habits\": []}";
        assert_eq!(extract_json_object(raw), Some("{\"habits\": []}"));
    }

    #[tokio::test]
    async fn llm_extractor_parses_fenced_reply_into_updates() {
        let provider = Arc::new(ScriptedMockProvider::always_text(
            "```json\n{\"facts\": [{\"subject\": \"user\", \"predicate\": \"likes\", \"object\": \"rust\"}]}\n```",
        ));
        let extractor = LlmExtractor::new(provider);
        let updates = extractor.extract(&record_with_metadata(Map::new())).await;
        assert_eq!(updates.len(), 1);
        assert!(matches!(&updates[0], LayerUpdate::SemanticFact { object, .. } if object == "rust"));
    }
}
