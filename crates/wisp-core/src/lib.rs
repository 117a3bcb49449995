// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Session model and dialogue orchestrator: context assembly, provider
//! calls, and the tool-call loop (spec §3, §4.3, §4.3.1, §4.8).

mod emotion_adapter;
mod events;
mod memory_adapter;
mod orchestrator;
mod session;
mod skill_adapter;

pub use events::{
    assistant_response_event, user_message_event, AssistantResponsePayload, UserMessagePayload,
    DIALOGUE_ASSISTANT_RESPONSE, DIALOGUE_USER_MESSAGE,
};
pub use orchestrator::{ChatOptions, DialogueError, DialogueOrchestrator, MemoryRecall, SkillRecall};
pub use session::{Message, Role, Session, ToolCallRecord};
