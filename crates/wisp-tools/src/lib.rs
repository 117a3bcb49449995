// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Built-in abilities and the capability scheduler that unifies built-in,
//! plugin, and MCP tool sources behind one enable/execute surface.

pub mod builtin;
pub mod registry;
pub mod tool;

pub use registry::{AbilitySource, CapabilityScheduler, ExternalRouter, ToolSchema};
pub use tool::{Ability, AbilityCall, AbilityContext, AbilityResult, ResultPart};

pub use builtin::web_fetch::WebFetchAbility;
pub use builtin::web_search::WebSearchAbility;
