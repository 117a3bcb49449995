// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! JSON-RPC 2.0 wire types for the plugin transport (spec §6 "JSON-RPC 2.0
//! (plugin transport)").

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PARSE_ERROR: i64 = -32700;
pub const INTERNAL_ERROR: i64 = -32603;
pub const PLUGIN_NOT_READY: i64 = -32000;
pub const ABILITY_NOT_FOUND: i64 = -32001;
pub const PERMISSION_DENIED: i64 = -32002;
pub const EXECUTION_TIMEOUT: i64 = -32003;
pub const PLUGIN_ERROR: i64 = -32010;

#[derive(Debug, Clone, Serialize)]
pub struct Request {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// `None` for notifications (spec: "notifications omit `id`").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

impl Request {
    pub fn call(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params: Some(params),
            id: Some(id),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

// ─── Typed params/results for the four methods ────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct InitializeParams {
    pub plugin_name: String,
    pub config: Value,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitializeResult {
    pub success: bool,
    #[serde(default)]
    pub abilities: Vec<Value>,
    #[serde(default)]
    pub skills: Vec<Value>,
    #[serde(default)]
    pub tools: Vec<Value>,
    #[serde(default)]
    pub mcp: Option<McpToolsWrapper>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct McpToolsWrapper {
    #[serde(default)]
    pub tools: Vec<Value>,
}

impl InitializeResult {
    /// The first non-empty declared-ability list, trying each of the four
    /// aliased fields in order (spec §4.4 step 4).
    pub fn effective_abilities(&self) -> Vec<Value> {
        if !self.abilities.is_empty() {
            return self.abilities.clone();
        }
        if !self.skills.is_empty() {
            return self.skills.clone();
        }
        if !self.tools.is_empty() {
            return self.tools.clone();
        }
        self.mcp
            .as_ref()
            .map(|m| m.tools.clone())
            .unwrap_or_default()
    }
}

/// All four name aliases carry the same ability name; `params` and
/// `arguments` carry the same object (spec §4.4 "Execute protocol").
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteParams {
    pub ability: String,
    pub skill: String,
    pub tool: String,
    pub name: String,
    pub params: Value,
    pub arguments: Value,
    pub context: Value,
}

impl ExecuteParams {
    pub fn new(name: impl Into<String>, args: Value, context: Value) -> Self {
        let name = name.into();
        Self {
            ability: name.clone(),
            skill: name.clone(),
            tool: name.clone(),
            name,
            params: args.clone(),
            arguments: args,
            context,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecuteResult {
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub emotion_hint: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthResult {
    pub healthy: bool,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
