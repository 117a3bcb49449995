// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;
use wisp_config::ToolsConfig;

use crate::{Ability, AbilityCall, AbilityContext, AbilityResult};

/// A tool schema in OpenAI-function-call shape, handed to the provider so it
/// knows what it can call.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Which of the three ability sources owns a registered name. Plugin
/// abilities carry the owning plugin's name so the star policy lookup
/// (`tools.stars.<name>`) resolves to the right config section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbilitySource {
    BuiltIn,
    Plugin(String),
    Mcp,
}

impl AbilitySource {
    /// Lower rank wins a name collision: built-in beats plugin beats MCP.
    fn rank(&self) -> u8 {
        match self {
            AbilitySource::BuiltIn => 0,
            AbilitySource::Plugin(_) => 1,
            AbilitySource::Mcp => 2,
        }
    }

    /// The `tools.stars.<key>` config section that governs this source.
    fn star_key(&self) -> &str {
        match self {
            AbilitySource::BuiltIn => "builtin",
            AbilitySource::Plugin(name) => name,
            AbilitySource::Mcp => "mcp",
        }
    }
}

/// Routes an ability call owned by an external source (a plugin subprocess
/// or an MCP server) to wherever it actually lives. The plugin supervisor
/// and MCP client manager each implement this and are wired into the
/// scheduler at startup — the scheduler never depends on them directly,
/// keeping the dependency graph acyclic.
#[async_trait]
pub trait ExternalRouter: Send + Sync {
    async fn execute(&self, call: &AbilityCall, ctx: &AbilityContext) -> AbilityResult;
}

enum Handler {
    BuiltIn(Arc<dyn Ability>),
    External(Arc<dyn ExternalRouter>),
}

struct Entry {
    source: AbilitySource,
    schema: ToolSchema,
    handler: Handler,
}

/// Unifies built-in abilities, plugin abilities, and MCP tools under one
/// registry with a single enable/policy surface. On a name collision the
/// higher-ranked source (built-in, then plugin, then MCP) wins; the loser is
/// logged and simply absent — never a load-time error.
pub struct CapabilityScheduler {
    entries: HashMap<String, Entry>,
}

impl CapabilityScheduler {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn register_builtin(&mut self, ability: impl Ability + 'static) {
        let name = ability.name().to_string();
        self.insert(
            name,
            AbilitySource::BuiltIn,
            ability.description().to_string(),
            ability.parameters_schema(),
            Handler::BuiltIn(Arc::new(ability)),
        );
    }

    pub fn register_external(
        &mut self,
        source: AbilitySource,
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
        router: Arc<dyn ExternalRouter>,
    ) {
        self.insert(
            name.into(),
            source,
            description.into(),
            parameters,
            Handler::External(router),
        );
    }

    fn insert(
        &mut self,
        name: String,
        source: AbilitySource,
        description: String,
        parameters: serde_json::Value,
        handler: Handler,
    ) {
        if let Some(existing) = self.entries.get(&name) {
            if existing.source.rank() <= source.rank() {
                warn!(
                    ability = %name,
                    winner = ?existing.source,
                    loser = ?source,
                    "ability name collision; higher-precedence source wins"
                );
                return;
            }
            warn!(
                ability = %name,
                winner = ?source,
                loser = ?existing.source,
                "ability name collision; higher-precedence source wins"
            );
        }
        self.entries.insert(
            name.clone(),
            Entry {
                source,
                schema: ToolSchema {
                    name,
                    description,
                    parameters,
                },
                handler,
            },
        );
    }

    /// Remove every ability owned by `plugin_name`, e.g. on plugin unload.
    pub fn unregister_plugin(&mut self, plugin_name: &str) {
        self.entries
            .retain(|_, e| e.source != AbilitySource::Plugin(plugin_name.to_string()));
    }

    /// Schemas for every enabled ability, filtered by per-star and
    /// per-ability toggles in `cfg`.
    pub fn get_tool_schemas(&self, cfg: &ToolsConfig) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .entries
            .values()
            .filter(|e| self.is_enabled(e, cfg))
            .map(|e| e.schema.clone())
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    fn is_enabled(&self, entry: &Entry, cfg: &ToolsConfig) -> bool {
        match cfg.stars.get(entry.source.star_key()) {
            Some(star) => {
                star.enabled
                    && star.allow_tools
                    && star.abilities.get(&entry.schema.name).copied().unwrap_or(true)
            }
            None => true,
        }
    }

    /// Execute `call`, routing to the owning source. Unknown names and
    /// permission-denied calls are returned as failed [`AbilityResult`]s,
    /// never propagated as errors.
    pub async fn execute(
        &self,
        call: &AbilityCall,
        ctx: &AbilityContext,
        cfg: &ToolsConfig,
    ) -> AbilityResult {
        let Some(entry) = self.entries.get(&call.name) else {
            return AbilityResult::err(&call.id, "Ability not found");
        };
        if !self.is_enabled(entry, cfg) {
            return AbilityResult::err(&call.id, "permission denied: ability is disabled");
        }
        match &entry.handler {
            Handler::BuiltIn(ability) => ability.execute(call, ctx).await,
            Handler::External(router) => router.execute(call, ctx).await,
        }
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for CapabilityScheduler {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;
    use wisp_config::StarConfig;

    use super::*;
    use crate::tool::Ability;

    struct EchoAbility {
        name: &'static str,
    }

    #[async_trait]
    impl Ability for EchoAbility {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            json!({ "type": "object" })
        }
        async fn execute(&self, call: &AbilityCall, _ctx: &AbilityContext) -> AbilityResult {
            AbilityResult::ok(&call.id, format!("echo:{}", call.args))
        }
    }

    struct StubRouter;

    #[async_trait]
    impl ExternalRouter for StubRouter {
        async fn execute(&self, call: &AbilityCall, _ctx: &AbilityContext) -> AbilityResult {
            AbilityResult::ok(&call.id, "external-ok")
        }
    }

    fn call(name: &str) -> AbilityCall {
        AbilityCall {
            id: "1".into(),
            name: name.into(),
            args: json!({}),
        }
    }

    #[tokio::test]
    async fn builtin_beats_plugin_on_collision() {
        let mut sched = CapabilityScheduler::new();
        sched.register_external(
            AbilitySource::Plugin("star-helper".into()),
            "shared",
            "plugin version",
            json!({}),
            Arc::new(StubRouter),
        );
        sched.register_builtin(EchoAbility { name: "shared" });

        let out = sched
            .execute(&call("shared"), &AbilityContext::default(), &ToolsConfig::default())
            .await;
        assert!(out.content.starts_with("echo:"));
    }

    #[tokio::test]
    async fn plugin_beats_mcp_on_collision() {
        let mut sched = CapabilityScheduler::new();
        sched.register_external(
            AbilitySource::Mcp,
            "shared",
            "mcp version",
            json!({}),
            Arc::new(StubRouter),
        );
        sched.register_builtin(EchoAbility { name: "other" });
        // Register a second plugin entry for the same name after MCP; plugin should win.
        sched.register_external(
            AbilitySource::Plugin("star-helper".into()),
            "shared",
            "plugin version",
            json!({}),
            Arc::new(StubRouter),
        );
        assert_eq!(
            sched.entries.get("shared").unwrap().source,
            AbilitySource::Plugin("star-helper".into())
        );
    }

    #[tokio::test]
    async fn unknown_ability_returns_not_found_error() {
        let sched = CapabilityScheduler::new();
        let out = sched
            .execute(&call("nope"), &AbilityContext::default(), &ToolsConfig::default())
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("not found"));
    }

    #[tokio::test]
    async fn disabled_star_denies_execution() {
        let mut sched = CapabilityScheduler::new();
        sched.register_builtin(EchoAbility { name: "shared" });
        let mut cfg = ToolsConfig::default();
        cfg.stars.insert(
            "builtin".into(),
            StarConfig {
                enabled: false,
                ..Default::default()
            },
        );
        let out = sched
            .execute(&call("shared"), &AbilityContext::default(), &cfg)
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("permission denied"));
    }

    #[test]
    fn schemas_filtered_by_ability_toggle() {
        let mut sched = CapabilityScheduler::new();
        sched.register_builtin(EchoAbility { name: "a" });
        sched.register_builtin(EchoAbility { name: "b" });
        let mut cfg = ToolsConfig::default();
        let mut star = StarConfig::default();
        star.abilities.insert("b".into(), false);
        cfg.stars.insert("builtin".into(), star);

        let schemas = sched.get_tool_schemas(&cfg);
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name, "a");
    }

    #[tokio::test]
    async fn unregister_plugin_removes_its_abilities() {
        let mut sched = CapabilityScheduler::new();
        sched.register_external(
            AbilitySource::Plugin("star-helper".into()),
            "plugin_ability",
            "d",
            json!({}),
            Arc::new(StubRouter),
        );
        sched.unregister_plugin("star-helper");
        assert!(sched.names().is_empty());
    }
}
