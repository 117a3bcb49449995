// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Dialogue-namespace events published on the bus (spec §6 event namespace).

use serde::Serialize;
use serde_json::Map;
use wisp_bus::Event;

pub const DIALOGUE_USER_MESSAGE: &str = "dialogue.user_message";
pub const DIALOGUE_ASSISTANT_RESPONSE: &str = "dialogue.assistant_response";

const SOURCE: &str = "dialogue-orchestrator";

#[derive(Debug, Clone, Serialize)]
pub struct UserMessagePayload {
    pub session_id: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssistantResponsePayload {
    pub session_id: String,
    pub content: String,
    pub model: String,
}

pub fn user_message_event(session_id: impl Into<String>, content: impl Into<String>) -> Event {
    Event::with_payload(
        DIALOGUE_USER_MESSAGE,
        SOURCE,
        UserMessagePayload {
            session_id: session_id.into(),
            content: content.into(),
        },
    )
}

pub fn assistant_response_event(
    session_id: impl Into<String>,
    content: impl Into<String>,
    model: impl Into<String>,
) -> Event {
    Event::with_payload(
        DIALOGUE_ASSISTANT_RESPONSE,
        SOURCE,
        AssistantResponsePayload {
            session_id: session_id.into(),
            content: content.into(),
            model: model.into(),
        },
    )
}

/// Empty payload helper, used where an event carries no data map.
pub fn empty_map() -> Map<String, serde_json::Value> {
    Map::new()
}
