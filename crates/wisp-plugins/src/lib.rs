// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! External plugin discovery, transport, and lifecycle (spec §4.4, §6).
//!
//! [`PluginSupervisor`] discovers manifests under a configured directory,
//! spawns one transport per plugin (stdio subprocess or HTTP), and routes
//! ability calls to them through the [`wisp_tools::ExternalRouter`]
//! interface. The capability scheduler that owns routed abilities never
//! depends on this crate directly, keeping the dependency graph acyclic.

mod manifest;
mod rpc;
mod supervisor;
mod transport;

pub use manifest::{discover, DeclaredAbility, ManifestError, PluginManifest, Runtime, Transport};
pub use rpc::{
    ExecuteParams, ExecuteResult, HealthResult, InitializeParams, InitializeResult,
    McpToolsWrapper, Request, Response, RpcError, ABILITY_NOT_FOUND, EXECUTION_TIMEOUT,
    INTERNAL_ERROR, PARSE_ERROR, PERMISSION_DENIED, PLUGIN_ERROR, PLUGIN_NOT_READY,
};
pub use supervisor::{PluginError, PluginState, PluginSupervisor};
pub use transport::{HttpTransport, PluginTransport, StdioTransport, TransportError};
