// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! The record and layer-update types (spec §3, §4.6).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One ingested dialogue turn. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    pub id: String,
    pub session_id: String,
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl MemoryRecord {
    pub fn new(
        session_id: impl Into<String>,
        role: impl Into<String>,
        content: impl Into<String>,
        metadata: Map<String, Value>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            role: role.into(),
            content: content.into(),
            metadata,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// A core-profile durable summary, upserted by `profile_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoreProfile {
    pub profile_id: String,
    pub summary: String,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A subject/predicate/object semantic fact, upserted by `fact_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SemanticFact {
    pub fact_id: String,
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A task-type → instruction procedural habit, upserted by `habit_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProceduralHabit {
    pub habit_id: String,
    pub task_type: String,
    pub instruction: String,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// One extractor output, dispatched to its owning layer store (spec §4.6
/// "Extraction").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum LayerUpdate {
    CoreProfile {
        summary: String,
        profile_id: Option<String>,
    },
    SemanticFact {
        subject: String,
        predicate: String,
        object: String,
        fact_id: Option<String>,
    },
    ProceduralHabit {
        task_type: String,
        instruction: String,
        habit_id: Option<String>,
    },
}

/// A recalled record with its scorer-assigned relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryResult {
    pub record: MemoryRecord,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_gets_a_fresh_uuid() {
        let a = MemoryRecord::new("s1", "user", "hi", Map::new());
        let b = MemoryRecord::new("s1", "user", "hi", Map::new());
        assert_ne!(a.id, b.id);
    }
}
