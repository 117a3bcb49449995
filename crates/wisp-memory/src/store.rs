// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Persistent record log plus the three layered stores, backed by a single
//! `rusqlite` connection (spec §4.6 "Layered memory").
//!
//! Upserts use `INSERT ... ON CONFLICT DO UPDATE ... WHERE excluded.updated_at
//! >= <table>.updated_at`, giving last-writer-wins semantics directly in SQL
//! rather than a read-modify-write round trip.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;

use crate::record::{CoreProfile, MemoryRecord, ProceduralHabit, SemanticFact};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("metadata serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    id         TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    role       TEXT NOT NULL,
    content    TEXT NOT NULL,
    metadata   TEXT NOT NULL,
    timestamp  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS records_session_id ON records(session_id);

CREATE TABLE IF NOT EXISTS core_profiles (
    profile_id TEXT PRIMARY KEY,
    summary    TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS semantic_facts (
    fact_id    TEXT PRIMARY KEY,
    subject    TEXT NOT NULL,
    predicate  TEXT NOT NULL,
    object     TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS procedural_habits (
    habit_id   TEXT PRIMARY KEY,
    task_type  TEXT NOT NULL,
    instruction TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Owns the sqlite connection backing all three memory layers plus the
/// immutable record log. A `tokio::sync::Mutex` serializes access; sqlite
/// operations here are small, local, and bundled (no network round trip),
/// so holding the lock across the call is cheap enough not to warrant
/// `spawn_blocking`.
pub struct MemoryStore {
    conn: Mutex<Connection>,
}

impl MemoryStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub async fn insert_record(&self, record: &MemoryRecord) -> Result<(), StoreError> {
        let metadata = serde_json::to_string(&record.metadata)?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO records (id, session_id, role, content, metadata, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id,
                record.session_id,
                record.role,
                record.content,
                metadata,
                record.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// All records, newest first, optionally scoped to one session.
    pub async fn list_records(&self, session_id: Option<&str>) -> Result<Vec<MemoryRecord>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = if session_id.is_some() {
            conn.prepare(
                "SELECT id, session_id, role, content, metadata, timestamp FROM records
                 WHERE session_id = ?1 ORDER BY timestamp DESC",
            )?
        } else {
            conn.prepare(
                "SELECT id, session_id, role, content, metadata, timestamp FROM records
                 ORDER BY timestamp DESC",
            )?
        };

        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(String, String, String, String, String, String)> {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        };

        let rows: Vec<_> = if let Some(sid) = session_id {
            stmt.query_map(params![sid], map_row)?.collect::<Result<_, _>>()?
        } else {
            stmt.query_map([], map_row)?.collect::<Result<_, _>>()?
        };

        rows.into_iter()
            .map(|(id, session_id, role, content, metadata, timestamp)| {
                Ok(MemoryRecord {
                    id,
                    session_id,
                    role,
                    content,
                    metadata: serde_json::from_str(&metadata)?,
                    timestamp: DateTime::parse_from_rfc3339(&timestamp)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })
            .collect()
    }

    pub async fn upsert_core_profile(
        &self,
        profile_id: &str,
        summary: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO core_profiles (profile_id, summary, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(profile_id) DO UPDATE SET
               summary = excluded.summary,
               updated_at = excluded.updated_at
             WHERE excluded.updated_at >= core_profiles.updated_at",
            params![profile_id, summary, updated_at.to_rfc3339()],
        )?;
        Ok(())
    }

    pub async fn get_core_profile(&self, profile_id: &str) -> Result<Option<CoreProfile>, StoreError> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT profile_id, summary, updated_at FROM core_profiles WHERE profile_id = ?1",
            params![profile_id],
            |row| {
                let updated_at: String = row.get(2)?;
                Ok(CoreProfile {
                    profile_id: row.get(0)?,
                    summary: row.get(1)?,
                    updated_at: DateTime::parse_from_rfc3339(&updated_at)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            },
        )
        .optional()
        .map_err(StoreError::from)
    }

    pub async fn upsert_semantic_fact(
        &self,
        fact_id: &str,
        subject: &str,
        predicate: &str,
        object: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO semantic_facts (fact_id, subject, predicate, object, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(fact_id) DO UPDATE SET
               subject = excluded.subject,
               predicate = excluded.predicate,
               object = excluded.object,
               updated_at = excluded.updated_at
             WHERE excluded.updated_at >= semantic_facts.updated_at",
            params![fact_id, subject, predicate, object, updated_at.to_rfc3339()],
        )?;
        Ok(())
    }

    pub async fn list_semantic_facts(&self) -> Result<Vec<SemanticFact>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT fact_id, subject, predicate, object, updated_at FROM semantic_facts",
        )?;
        let rows = stmt.query_map([], |row| {
            let updated_at: String = row.get(4)?;
            Ok(SemanticFact {
                fact_id: row.get(0)?,
                subject: row.get(1)?,
                predicate: row.get(2)?,
                object: row.get(3)?,
                updated_at: DateTime::parse_from_rfc3339(&updated_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    pub async fn upsert_procedural_habit(
        &self,
        habit_id: &str,
        task_type: &str,
        instruction: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO procedural_habits (habit_id, task_type, instruction, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(habit_id) DO UPDATE SET
               task_type = excluded.task_type,
               instruction = excluded.instruction,
               updated_at = excluded.updated_at
             WHERE excluded.updated_at >= procedural_habits.updated_at",
            params![habit_id, task_type, instruction, updated_at.to_rfc3339()],
        )?;
        Ok(())
    }

    pub async fn list_procedural_habits(&self) -> Result<Vec<ProceduralHabit>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT habit_id, task_type, instruction, updated_at FROM procedural_habits",
        )?;
        let rows = stmt.query_map([], |row| {
            let updated_at: String = row.get(3)?;
            Ok(ProceduralHabit {
                habit_id: row.get(0)?,
                task_type: row.get(1)?,
                instruction: row.get(2)?,
                updated_at: DateTime::parse_from_rfc3339(&updated_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[tokio::test]
    async fn insert_and_list_records_round_trip() {
        let store = MemoryStore::open_in_memory().unwrap();
        let record = MemoryRecord::new("s1", "user", "hello", Map::new());
        store.insert_record(&record).await.unwrap();
        let found = store.list_records(Some("s1")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].content, "hello");
    }

    #[tokio::test]
    async fn upsert_core_profile_is_last_writer_wins() {
        let store = MemoryStore::open_in_memory().unwrap();
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(1);
        store.upsert_core_profile("p1", "first", t0).await.unwrap();
        store.upsert_core_profile("p1", "second", t1).await.unwrap();
        let profile = store.get_core_profile("p1").await.unwrap().unwrap();
        assert_eq!(profile.summary, "second");
    }

    #[tokio::test]
    async fn upsert_core_profile_rejects_stale_write() {
        let store = MemoryStore::open_in_memory().unwrap();
        let t0 = Utc::now();
        let stale = t0 - chrono::Duration::seconds(10);
        store.upsert_core_profile("p1", "latest", t0).await.unwrap();
        store.upsert_core_profile("p1", "stale", stale).await.unwrap();
        let profile = store.get_core_profile("p1").await.unwrap().unwrap();
        assert_eq!(profile.summary, "latest");
    }

    #[tokio::test]
    async fn upsert_semantic_fact_round_trips() {
        let store = MemoryStore::open_in_memory().unwrap();
        store
            .upsert_semantic_fact("f1", "user", "likes", "rust", Utc::now())
            .await
            .unwrap();
        let facts = store.list_semantic_facts().await.unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].object, "rust");
    }
}
