// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::Value;

/// A single ability invocation requested by the model.
#[derive(Debug, Clone)]
pub struct AbilityCall {
    /// Opaque identifier returned by the model (forwarded verbatim).
    pub id: String,
    pub name: String,
    /// Parsed JSON arguments.
    pub args: Value,
}

/// Caller-scoped context threaded through an ability invocation: who is
/// calling, in which session, and what they're permitted to do. Built fresh
/// per tool call from the caller's `ToolCallConfig`.
#[derive(Debug, Clone, Default)]
pub struct AbilityContext {
    pub user_id: String,
    pub session_id: String,
    pub permissions: Vec<String>,
}

/// A single content item in a rich ability result.
/// Most abilities produce only `Text`; vision-capable ones may mix in `Image`.
#[derive(Debug, Clone)]
pub enum ResultPart {
    /// Plain UTF-8 text.
    Text(String),
    /// Base64 data URL: `data:<mime>;base64,<b64>`.
    Image(String),
}

/// Outcome of executing an ability.
#[derive(Debug, Clone)]
pub struct AbilityResult {
    pub call_id: String,
    /// Plain-text content - concatenation of all `Text` parts. Always set.
    pub content: String,
    pub parts: Vec<ResultPart>,
    /// `true` if the ability failed non-fatally (returned an error message,
    /// not a propagated panic or bug).
    pub is_error: bool,
    /// Optional hint for the emotion pipeline (e.g. a tool observed the user
    /// expressing frustration) attached by the ability itself.
    pub emotion_hint: Option<String>,
}

impl AbilityResult {
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let text = content.into();
        Self {
            call_id: call_id.into(),
            content: text.clone(),
            parts: vec![ResultPart::Text(text)],
            is_error: false,
            emotion_hint: None,
        }
    }

    pub fn err(call_id: impl Into<String>, msg: impl Into<String>) -> Self {
        let text = msg.into();
        Self {
            call_id: call_id.into(),
            content: text.clone(),
            parts: vec![ResultPart::Text(text)],
            is_error: true,
            emotion_hint: None,
        }
    }

    /// Result with arbitrary parts (text and/or images). `content` becomes
    /// the concatenation of all `Text` parts.
    pub fn with_parts(call_id: impl Into<String>, parts: Vec<ResultPart>) -> Self {
        let text = parts
            .iter()
            .filter_map(|p| match p {
                ResultPart::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            call_id: call_id.into(),
            content: text,
            parts,
            is_error: false,
            emotion_hint: None,
        }
    }

    pub fn has_images(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, ResultPart::Image(_)))
    }
}

/// Trait every built-in ability must implement. Plugin and MCP abilities are
/// not `Ability` impls themselves — they're routed by the capability
/// scheduler through the plugin supervisor / MCP client instead — but share
/// this same result shape.
#[async_trait]
pub trait Ability: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for parameters.
    fn parameters_schema(&self) -> Value;
    /// Execute the ability. Failures must be wrapped in [`AbilityResult::err`]
    /// rather than propagated - a raising ability is converted to a failure
    /// result by the scheduler regardless, but well-behaved abilities report
    /// their own errors directly.
    async fn execute(&self, call: &AbilityCall, ctx: &AbilityContext) -> AbilityResult;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
