// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Session model: message history with the trim-on-mutation invariant
//! (spec §3, §4.8, §8 "Session trim").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A message role. `Tool` carries the `tool_call_id` it answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call emitted by the assistant, normalized to a decoded argument map
/// (spec §4.2: "the orchestrator normalizes to a decoded map before dispatch").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One entry in a [`Session`]'s history.
///
/// Invariant (spec §3): `role == Role::Tool` implies `tool_call_id` is
/// `Some` and non-empty. Enforced at construction via the `tool` constructor;
/// callers building a `Message` by hand are responsible for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
            metadata: Map::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// An assistant message carrying one or more tool calls (spec §4.3 step 2).
    pub fn assistant_with_tool_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolCallRecord>,
    ) -> Self {
        let mut m = Self::new(Role::Assistant, content);
        m.tool_calls = tool_calls;
        m
    }

    /// A tool-role reply, required to carry a non-empty `tool_call_id`
    /// (spec §3 invariant).
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut m = Self::new(Role::Tool, content);
        m.tool_call_id = Some(tool_call_id.into());
        m
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }

    /// Approximate token count, 4 chars ≈ 1 token, used only for the
    /// informational `context_fraction` bookkeeping — not an enforced budget.
    pub fn approx_tokens(&self) -> usize {
        (self.content.len() / 4).max(1)
    }
}

/// In-memory conversation session, exclusively owned by the dialogue
/// orchestrator (spec §3 Ownership). No cross-restart persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub owner_id: String,
    pub messages: Vec<Message>,
    pub system_prompt: Option<String>,
    /// Cap enforced by [`Session::add_message`]: `len(messages) <= max_history`
    /// with every system message retained and the remainder trimmed from the
    /// head (spec §3, §8).
    pub max_history: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(owner_id: impl Into<String>, max_history: usize) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            messages: Vec::new(),
            system_prompt: None,
            max_history,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Append `message` and enforce the history cap.
    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
        self.enforce_cap();
        self.updated_at = Utc::now();
    }

    /// Drop non-system messages from the head until `len(messages) <=
    /// max_history`, keeping all system messages regardless of position.
    fn enforce_cap(&mut self) {
        if self.messages.len() <= self.max_history {
            return;
        }
        let system_count = self.messages.iter().filter(|m| m.is_system()).count();
        let keep_non_system = self.max_history.saturating_sub(system_count);
        let total_non_system = self.messages.len() - system_count;
        let drop_from_head = total_non_system.saturating_sub(keep_non_system);

        let mut dropped = 0usize;
        self.messages.retain(|m| {
            if m.is_system() {
                return true;
            }
            if dropped < drop_from_head {
                dropped += 1;
                false
            } else {
                true
            }
        });
    }

    pub fn approx_token_count(&self) -> usize {
        self.messages.iter().map(Message::approx_tokens).sum()
    }

    /// Messages with existing `role == system` entries removed, used by
    /// context assembly (spec §4.3 step 4) to avoid double-injecting the
    /// persona/memory/skill system blocks built fresh for this call.
    pub fn non_system_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| !m.is_system())
    }
}

/// Plain, serializable form of a [`Session`] for transport (spec §4.8:
/// "Serializes to and from a dictionary form for transport").
pub type SessionDict = Session;

pub fn to_dict(session: &Session) -> serde_json::Result<Value> {
    serde_json::to_value(session)
}

pub fn from_dict(value: Value) -> serde_json::Result<Session> {
    serde_json::from_value(value)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
