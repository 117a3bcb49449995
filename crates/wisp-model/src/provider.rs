// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;

use crate::{
    catalog::{InputModality, ModelCatalogEntry},
    CompletionRequest, ConnectionStatus, ResponseEvent,
};

pub type ResponseStream = Pin<Box<dyn Stream<Item = anyhow::Result<ResponseEvent>> + Send>>;

/// Upstream provider failure taxonomy (spec §4.2 / §7). Drivers construct
/// these and the orchestrator surfaces them unchanged, never retrying.
/// Errors that don't originate from a driver (e.g. a bug in this crate)
/// stay as plain `anyhow::Error` and are treated as [`ProviderError::Unavailable`]
/// by callers that need to classify an opaque failure.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("provider rejected request: {0}")]
    Rejected(String),
    #[error("provider timed out")]
    Timeout,
}

/// A single tool invocation requested by the model, accumulated from the
/// `ToolCall` event(s) in a [`complete`](ModelProvider::complete) stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Aggregate, non-streaming reply assembled from a provider's event stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatReply {
    pub text: String,
    pub model: String,
    pub tool_calls: Vec<ToolCallRequest>,
    /// Provider-reported completion reason (e.g. `"stop"`, `"tool_calls"`,
    /// `"length"`). `None` for drivers that don't report one.
    pub finish_reason: Option<String>,
    pub usage: crate::types::Usage,
}

#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Human-readable provider name for status display.
    fn name(&self) -> &str;

    /// Model identifier as reported to users.
    fn model_name(&self) -> &str;

    /// Send a completion request and return a streaming response.
    ///
    /// This is the one method every provider must implement; `chat` and
    /// `stream_chat` below are convenience wrappers built on top of it.
    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream>;

    /// Drain a [`complete`](Self::complete) stream into a single aggregate
    /// reply. `ToolCall` events accumulate into `tool_calls`, `TextDelta`
    /// events concatenate into `text`, and the last `Usage` event wins.
    /// `ThinkingDelta` is dropped; `Error` short-circuits the whole call.
    async fn chat(&self, req: CompletionRequest) -> anyhow::Result<ChatReply> {
        let mut stream = self.complete(req).await?;
        let mut reply = ChatReply {
            model: self.model_name().to_string(),
            ..ChatReply::default()
        };
        let mut calls: std::collections::HashMap<String, ToolCallRequest> =
            std::collections::HashMap::new();
        let mut order = Vec::new();
        while let Some(event) = stream.next().await {
            match event? {
                ResponseEvent::TextDelta(delta) => reply.text.push_str(&delta),
                ResponseEvent::ToolCall { id, name, arguments } => {
                    if !calls.contains_key(&id) {
                        order.push(id.clone());
                    }
                    let entry = calls.entry(id.clone()).or_insert_with(|| ToolCallRequest {
                        id,
                        name: name.clone(),
                        arguments: String::new(),
                    });
                    entry.name = name;
                    entry.arguments.push_str(&arguments);
                }
                ResponseEvent::ThinkingDelta(_) => {}
                ResponseEvent::Usage {
                    input_tokens,
                    output_tokens,
                    cache_read_tokens,
                    cache_write_tokens,
                } => {
                    reply.usage = crate::types::Usage {
                        input_tokens,
                        output_tokens,
                        cache_read_tokens,
                        cache_write_tokens,
                    };
                }
                ResponseEvent::Done => break,
                ResponseEvent::Error(message) => anyhow::bail!("provider error: {message}"),
            }
        }
        reply.tool_calls = order
            .into_iter()
            .filter_map(|id| calls.remove(&id))
            .collect();
        reply.finish_reason = Some(if reply.tool_calls.is_empty() { "stop" } else { "tool_calls" }.to_string());
        Ok(reply)
    }

    /// Stream only the text content of a completion, filtering out tool
    /// calls, thinking deltas, and usage/done/error framing.
    async fn stream_chat(
        &self,
        req: CompletionRequest,
    ) -> anyhow::Result<Pin<Box<dyn Stream<Item = anyhow::Result<String>> + Send>>> {
        let stream = self.complete(req).await?;
        let text_only = stream.filter_map(|event| async move {
            match event {
                Ok(ResponseEvent::TextDelta(delta)) => Some(Ok(delta)),
                Ok(ResponseEvent::Error(message)) => {
                    Some(Err(anyhow::anyhow!("provider error: {message}")))
                }
                Ok(_) => None,
                Err(err) => Some(Err(err)),
            }
        });
        Ok(Box::pin(text_only))
    }

    /// Probe reachability/auth without running a full completion.
    ///
    /// The default implementation calls `list_models` and reports success iff
    /// that returns without erroring; override with a cheaper driver-specific
    /// probe (e.g. a models-list endpoint) where one exists.
    async fn test_connection(&self) -> ConnectionStatus {
        match self.list_models().await {
            Ok(models) => ConnectionStatus {
                ok: true,
                detail: format!("{} model(s) available", models.len()),
            },
            Err(e) => ConnectionStatus { ok: false, detail: e.to_string() },
        }
    }

    /// Model identifiers available from this provider, derived from the
    /// static catalog by default.
    async fn available_models(&self) -> Vec<String> {
        self.list_models()
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|e| e.id)
            .collect()
    }

    /// List all models available from this provider.
    ///
    /// The default implementation returns only the static catalog entries for
    /// this provider.  Override to perform a live API query (and then merge
    /// with the catalog for metadata enrichment).
    async fn list_models(&self) -> anyhow::Result<Vec<ModelCatalogEntry>> {
        let provider = self.name();
        let entries = crate::catalog::static_catalog()
            .into_iter()
            .filter(|e| e.provider == provider)
            .collect();
        Ok(entries)
    }

    /// Maximum output tokens for this provider/model combination.
    ///
    /// Reads from the static catalog; returns `None` if the model is unknown.
    fn catalog_max_output_tokens(&self) -> Option<u32> {
        crate::catalog::lookup(self.name(), self.model_name()).map(|e| e.max_output_tokens)
    }

    /// Context window size for this provider/model combination.
    ///
    /// Reads from the static catalog; returns `None` if the model is unknown.
    fn catalog_context_window(&self) -> Option<u32> {
        crate::catalog::lookup(self.name(), self.model_name()).map(|e| e.context_window)
    }

    /// Query the live API for the actual context window in use.
    ///
    /// Default implementation returns `None` (no live probe available).
    /// Override in providers that expose a properties or info endpoint —
    /// e.g. llama.cpp-compatible servers expose `GET /props` which includes
    /// the loaded `n_ctx` value.
    ///
    /// Returns `Some(n_ctx)` when the probe succeeds, `None` otherwise.
    /// A `Some(0)` result is treated as "unknown" by callers.
    async fn probe_context_window(&self) -> Option<u32> {
        None
    }

    /// Input modalities supported by this provider/model combination.
    ///
    /// Reads from the static catalog.  Returns `[Text]` when the model is not
    /// found, to be conservative (avoid sending images to unknown models).
    fn input_modalities(&self) -> Vec<InputModality> {
        crate::catalog::lookup(self.name(), self.model_name())
            .map(|e| e.input_modalities)
            .unwrap_or_else(|| vec![InputModality::Text])
    }

    /// Returns `true` if this model supports image input.
    fn supports_images(&self) -> bool {
        self.input_modalities().contains(&InputModality::Image)
    }
}
