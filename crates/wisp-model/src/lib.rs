// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Abstract model provider contract: the [`ModelProvider`] trait, the wire
//! types flowing through it, and a deterministic mock implementation for
//! tests. Concrete HTTP drivers (OpenAI, Anthropic, ...) are not part of
//! this crate; callers plug in their own [`ModelProvider`] implementation.

pub mod catalog;
mod mock;
mod provider;
mod types;

pub use catalog::{InputModality, ModelCatalogEntry};
pub use mock::{MockProvider, ScriptedMockProvider};
pub use provider::{ChatReply, ModelProvider, ProviderError, ResponseStream, ToolCallRequest};
pub use types::*;
