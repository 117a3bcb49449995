// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Plugin supervisor: load protocol, lifecycle, and ability routing
//! (spec §4.4).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;
use wisp_bus::{Event, EventBus};
use wisp_config::PluginsConfig;
use wisp_tools::{AbilityCall, AbilityContext, AbilityResult, ExternalRouter};

use crate::manifest::{DeclaredAbility, PluginManifest};
use crate::rpc::{ExecuteParams, ExecuteResult, HealthResult, InitializeParams, InitializeResult};
use crate::transport::{HttpTransport, PluginTransport, StdioTransport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Discovered,
    Loading,
    Running,
    Reloading,
    Unloading,
    Stopped,
}

impl PluginState {
    fn as_str(&self) -> &'static str {
        match self {
            PluginState::Discovered => "discovered",
            PluginState::Loading => "loading",
            PluginState::Running => "running",
            PluginState::Reloading => "reloading",
            PluginState::Unloading => "unloading",
            PluginState::Stopped => "stopped",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("plugin not found: {0}")]
    NotFound(String),
    #[error("invalid manifest: {0}")]
    InvalidManifest(#[from] crate::manifest::ManifestError),
    #[error("ability name collision: {0}")]
    NameCollision(String),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

struct LoadedPlugin {
    manifest: PluginManifest,
    config: Value,
    abilities: Vec<DeclaredAbility>,
    transport: Arc<dyn PluginTransport>,
    state: PluginState,
}

struct SupervisorState {
    plugins: HashMap<String, LoadedPlugin>,
    /// Ability name → owning plugin name, enforced globally unique at load
    /// time (spec §3 PluginManifest invariant).
    ability_owner: HashMap<String, String>,
}

/// Discovers, spawns, and supervises external plugin processes, and routes
/// ability calls to them. Implements [`ExternalRouter`] so the capability
/// scheduler can dispatch to it without depending on this crate directly.
pub struct PluginSupervisor {
    state: tokio::sync::Mutex<SupervisorState>,
    bus: Arc<EventBus>,
    cfg: PluginsConfig,
}

impl PluginSupervisor {
    pub fn new(cfg: PluginsConfig, bus: Arc<EventBus>) -> Self {
        Self {
            state: tokio::sync::Mutex::new(SupervisorState {
                plugins: HashMap::new(),
                ability_owner: HashMap::new(),
            }),
            bus,
            cfg,
        }
    }

    pub fn discover(&self) -> Vec<PluginManifest> {
        crate::manifest::discover(&self.cfg.directory)
    }

    /// Discover and load every plugin under the configured directory,
    /// logging and skipping any that fail to load individually.
    pub async fn load_all(&self) {
        for manifest in self.discover() {
            let name = manifest.name.clone();
            if let Err(e) = self.load(manifest, Value::Null).await {
                warn!(plugin = %name, error = %e, "failed to load plugin");
            }
        }
    }

    async fn emit_state(&self, plugin: &str, state: PluginState) {
        self.bus
            .publish(Event::with_payload(
                "plugin.state_changed",
                "plugin-supervisor",
                serde_json::json!({ "plugin": plugin, "state": state.as_str() }),
            ))
            .await;
    }

    /// Runs the §4.4 load protocol for one manifest: transport selection,
    /// `initialize` round-trip, effective-ability resolution, and the
    /// global ability-name-collision check. On collision the subprocess is
    /// torn down and the load is rejected entirely.
    pub async fn load(&self, manifest: PluginManifest, config: Value) -> Result<(), PluginError> {
        let name = manifest.name.clone();
        self.emit_state(&name, PluginState::Loading).await;

        maybe_install_dependencies(&manifest, &self.cfg).await;

        let transport: Arc<dyn PluginTransport> = match manifest.runtime.transport {
            crate::manifest::Transport::Stdio => {
                let command = manifest.runtime.command_line().unwrap_or_default();
                Arc::new(StdioTransport::spawn(command)?.named(name.clone()))
            }
            crate::manifest::Transport::Http => {
                let url = manifest.runtime.http_url.clone().unwrap_or_default();
                Arc::new(HttpTransport::new(&url))
            }
        };

        let init_params = InitializeParams {
            plugin_name: name.clone(),
            config: config.clone(),
            permissions: manifest.permissions.clone(),
        };
        let timeout = Duration::from_secs(self.cfg.execute_timeout_secs);
        let init_value = transport
            .call(
                "initialize",
                serde_json::to_value(&init_params).unwrap_or(Value::Null),
                timeout,
            )
            .await;
        let init_value = match init_value {
            Ok(v) => v,
            Err(e) => {
                transport.close().await;
                return Err(PluginError::Transport(e));
            }
        };
        let init_result: InitializeResult = serde_json::from_value(init_value).unwrap_or_default();

        let effective = init_result.effective_abilities();
        let abilities: Vec<DeclaredAbility> = if effective.is_empty() {
            manifest.abilities.clone()
        } else {
            effective
                .into_iter()
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect()
        };

        let mut state = self.state.lock().await;
        if let Some(collision) = abilities
            .iter()
            .find_map(|a| state.ability_owner.get(&a.name).cloned())
        {
            drop(state);
            transport.close().await;
            self.emit_state(&name, PluginState::Stopped).await;
            return Err(PluginError::NameCollision(format!(
                "ability '{collision}' already owned by another plugin"
            )));
        }
        for ability in &abilities {
            state
                .ability_owner
                .insert(ability.name.clone(), name.clone());
        }
        state.plugins.insert(
            name.clone(),
            LoadedPlugin {
                manifest,
                config,
                abilities,
                transport,
                state: PluginState::Running,
            },
        );
        drop(state);
        self.emit_state(&name, PluginState::Running).await;
        Ok(())
    }

    /// Best-effort `shutdown` RPC within `shutdown_timeout_secs`, then closes
    /// the transport (killing the subprocess) regardless of whether the RPC
    /// succeeded.
    pub async fn unload(&self, name: &str) -> Result<(), PluginError> {
        self.emit_state(name, PluginState::Unloading).await;
        let mut state = self.state.lock().await;
        let Some(mut plugin) = state.plugins.remove(name) else {
            drop(state);
            return Err(PluginError::NotFound(name.to_string()));
        };
        plugin
            .abilities
            .iter()
            .for_each(|a| {
                state.ability_owner.remove(&a.name);
            });
        drop(state);

        let shutdown_timeout = Duration::from_secs(self.cfg.shutdown_timeout_secs);
        let _ = plugin
            .transport
            .call("shutdown", Value::Null, shutdown_timeout)
            .await;
        plugin.transport.close().await;
        plugin.state = PluginState::Stopped;
        self.emit_state(name, PluginState::Stopped).await;
        Ok(())
    }

    /// `unload` then re-`load` with the plugin's previous manifest and
    /// config.
    pub async fn reload(&self, name: &str) -> Result<(), PluginError> {
        self.emit_state(name, PluginState::Reloading).await;
        let (manifest, config) = {
            let state = self.state.lock().await;
            let plugin = state.plugins.get(name).ok_or_else(|| PluginError::NotFound(name.to_string()))?;
            (plugin.manifest.clone(), plugin.config.clone())
        };
        self.unload(name).await?;
        self.load(manifest, config).await
    }

    /// Tears down every loaded plugin; called on supervisor shutdown.
    pub async fn unload_all(&self) {
        let names: Vec<String> = {
            let state = self.state.lock().await;
            state.plugins.keys().cloned().collect()
        };
        for name in names {
            if let Err(e) = self.unload(&name).await {
                warn!(plugin = %name, error = %e, "error unloading plugin during shutdown");
            }
        }
    }

    pub async fn health(&self, name: &str) -> bool {
        let state = self.state.lock().await;
        let Some(plugin) = state.plugins.get(name) else {
            return false;
        };
        if !plugin.transport.is_running() {
            return false;
        }
        let transport = Arc::clone(&plugin.transport);
        drop(state);
        let timeout = Duration::from_secs(5);
        match transport.call("health", Value::Null, timeout).await {
            Ok(value) => serde_json::from_value::<HealthResult>(value)
                .map(|r| r.healthy)
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    pub async fn loaded_names(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut names: Vec<String> = state.plugins.keys().cloned().collect();
        names.sort();
        names
    }

    /// The effective abilities a loaded plugin exposes, for registering
    /// into a [`wisp_tools::CapabilityScheduler`] at startup. Empty if the
    /// plugin isn't loaded.
    pub async fn abilities(&self, name: &str) -> Vec<DeclaredAbility> {
        let state = self.state.lock().await;
        state
            .plugins
            .get(name)
            .map(|p| p.abilities.clone())
            .unwrap_or_default()
    }

    /// Every loaded plugin paired with its effective abilities, in
    /// `loaded_names()` order.
    pub async fn all_abilities(&self) -> Vec<(String, Vec<DeclaredAbility>)> {
        let state = self.state.lock().await;
        let mut names: Vec<&String> = state.plugins.keys().collect();
        names.sort();
        names
            .into_iter()
            .map(|name| (name.clone(), state.plugins[name].abilities.clone()))
            .collect()
    }
}

/// Runs the language-appropriate dependency install step iff configuration
/// opts in and the relevant marker file exists (spec §4.4 step 2). Best
/// effort: failures are logged, never abort the load.
async fn maybe_install_dependencies(manifest: &PluginManifest, cfg: &PluginsConfig) {
    if !cfg.install_dependencies {
        return;
    }
    let (marker, command): (&str, &[&str]) = match manifest.runtime.language.as_deref() {
        Some("python") => ("requirements.txt", &["pip", "install", "-r", "requirements.txt"]),
        Some("node") | Some("js") => ("package.json", &["npm", "install"]),
        Some("go") => ("go.mod", &["go", "mod", "download"]),
        _ => return,
    };
    if !manifest.dir.join(marker).exists() {
        return;
    }
    let result = tokio::process::Command::new(command[0])
        .args(&command[1..])
        .current_dir(&manifest.dir)
        .output()
        .await;
    if let Err(e) = result {
        warn!(plugin = %manifest.name, error = %e, "dependency install failed");
    }
}

#[async_trait]
impl ExternalRouter for PluginSupervisor {
    /// Routes `call` to the owning plugin's `execute` RPC. Per spec §4.3.1
    /// and the plugin-crash scenario (§8), failures are always converted to
    /// an [`AbilityResult::err`] — never propagated.
    async fn execute(&self, call: &AbilityCall, ctx: &AbilityContext) -> AbilityResult {
        let (plugin_name, transport, timeout) = {
            let state = self.state.lock().await;
            let Some(plugin_name) = state.ability_owner.get(&call.name).cloned() else {
                return AbilityResult::err(&call.id, "Ability not found");
            };
            let Some(plugin) = state.plugins.get(&plugin_name) else {
                return AbilityResult::err(&call.id, format!("Plugin not running: {plugin_name}"));
            };
            (
                plugin_name,
                Arc::clone(&plugin.transport),
                Duration::from_secs(self.cfg.execute_timeout_secs),
            )
        };

        if !transport.is_running() {
            return AbilityResult::err(&call.id, format!("Plugin not running: {plugin_name}"));
        }

        let params = ExecuteParams::new(
            call.name.clone(),
            call.args.clone(),
            serde_json::json!({
                "user_id": ctx.user_id,
                "session_id": ctx.session_id,
                "permissions": ctx.permissions,
            }),
        );
        let params_value = serde_json::to_value(&params).unwrap_or(Value::Null);

        match transport.call("execute", params_value, timeout).await {
            Ok(value) => {
                let result: ExecuteResult = serde_json::from_value(value).unwrap_or_default();
                if result.success {
                    let content = result
                        .data
                        .map(|d| d.to_string())
                        .unwrap_or_default();
                    let mut out = AbilityResult::ok(&call.id, content);
                    out.emotion_hint = result.emotion_hint;
                    out
                } else {
                    AbilityResult::err(&call.id, result.error.unwrap_or_else(|| "Error".to_string()))
                }
            }
            Err(TransportError::NotRunning(_)) => {
                AbilityResult::err(&call.id, format!("Plugin not running: {plugin_name}"))
            }
            Err(TransportError::Timeout) => AbilityResult::err(&call.id, "ExecutionTimeout"),
            Err(e) => AbilityResult::err(&call.id, e.to_string()),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// A shell "plugin" that answers `initialize` with one ability and
    /// `execute` by echoing its arguments, then exits after the optional
    /// N-th line (used to simulate a mid-session crash).
    fn write_plugin(dir: &std::path::Path, name: &str, exit_after_calls: Option<u32>) {
        fs::create_dir(dir.join(name)).unwrap();
        let manifest = serde_json::json!({
            "name": name,
            "version": "1.0.0",
            "runtime": { "entry": format!("{}/run.sh", dir.join(name).display()) }
        });
        fs::write(
            dir.join(name).join("manifest.json"),
            serde_json::to_string(&manifest).unwrap(),
        )
        .unwrap();

        let limit = exit_after_calls
            .map(|n| format!("count=$((count+1)); if [ \"$count\" -gt {n} ]; then exit 0; fi"))
            .unwrap_or_default();

        let script = format!(
            r#"#!/usr/bin/env bash
count=0
while IFS= read -r line; do
  {limit}
  id=$(echo "$line" | grep -o '"id":[0-9]*' | cut -d: -f2)
  method=$(echo "$line" | grep -o '"method":"[a-z]*"' | cut -d: -f2 | tr -d '"')
  if [ "$method" = "initialize" ]; then
    echo "{{\"jsonrpc\":\"2.0\",\"id\":$id,\"result\":{{\"success\":true,\"abilities\":[{{\"name\":\"echo_{name}\",\"description\":\"echoes\"}}]}}}}"
  else
    echo "{{\"jsonrpc\":\"2.0\",\"id\":$id,\"result\":{{\"success\":true,\"data\":\"ok\"}}}}"
  fi
done
"#
        );
        let script_path = dir.join(name).join("run.sh");
        fs::write(&script_path, script).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&script_path).unwrap().permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&script_path, perms).unwrap();
        }
    }

    fn cfg(dir: &std::path::Path) -> PluginsConfig {
        PluginsConfig {
            directory: dir.to_path_buf(),
            execute_timeout_secs: 5,
            shutdown_timeout_secs: 1,
            install_dependencies: false,
        }
    }

    #[tokio::test]
    async fn load_registers_effective_abilities_from_initialize() {
        let tmp = tempfile::tempdir().unwrap();
        write_plugin(tmp.path(), "demo", None);
        let supervisor = PluginSupervisor::new(cfg(tmp.path()), Arc::new(EventBus::new(16)));
        supervisor.load_all().await;
        assert_eq!(supervisor.loaded_names().await, vec!["demo".to_string()]);
    }

    #[tokio::test]
    async fn execute_routes_to_owning_plugin() {
        let tmp = tempfile::tempdir().unwrap();
        write_plugin(tmp.path(), "demo", None);
        let supervisor = PluginSupervisor::new(cfg(tmp.path()), Arc::new(EventBus::new(16)));
        supervisor.load_all().await;

        let call = AbilityCall {
            id: "1".into(),
            name: "echo_demo".into(),
            args: serde_json::json!({}),
        };
        let out = supervisor.execute(&call, &AbilityContext::default()).await;
        assert!(!out.is_error, "{}", out.content);
        assert_eq!(out.content, "\"ok\"");
    }

    #[tokio::test]
    async fn unknown_ability_is_not_found_without_touching_any_plugin() {
        let tmp = tempfile::tempdir().unwrap();
        let supervisor = PluginSupervisor::new(cfg(tmp.path()), Arc::new(EventBus::new(16)));
        let call = AbilityCall {
            id: "1".into(),
            name: "nope".into(),
            args: serde_json::json!({}),
        };
        let out = supervisor.execute(&call, &AbilityContext::default()).await;
        assert!(out.is_error);
        assert_eq!(out.content, "Ability not found");
    }

    #[tokio::test]
    async fn second_execute_after_plugin_crash_reports_not_running() {
        let tmp = tempfile::tempdir().unwrap();
        // Exits after handling the initialize call plus one execute call.
        write_plugin(tmp.path(), "demo", Some(1));
        let supervisor = PluginSupervisor::new(cfg(tmp.path()), Arc::new(EventBus::new(16)));
        supervisor.load_all().await;

        let call = AbilityCall {
            id: "1".into(),
            name: "echo_demo".into(),
            args: serde_json::json!({}),
        };
        let first = supervisor.execute(&call, &AbilityContext::default()).await;
        assert!(!first.is_error);

        // Give the subprocess time to exit after the first execute.
        tokio::time::sleep(Duration::from_millis(300)).await;

        let second = supervisor.execute(&call, &AbilityContext::default()).await;
        assert!(second.is_error);
        assert_eq!(second.content, "Plugin not running: demo");
    }

    #[tokio::test]
    async fn unload_removes_plugin_and_its_abilities() {
        let tmp = tempfile::tempdir().unwrap();
        write_plugin(tmp.path(), "demo", None);
        let supervisor = PluginSupervisor::new(cfg(tmp.path()), Arc::new(EventBus::new(16)));
        supervisor.load_all().await;
        supervisor.unload("demo").await.unwrap();
        assert!(supervisor.loaded_names().await.is_empty());

        let call = AbilityCall {
            id: "1".into(),
            name: "echo_demo".into(),
            args: serde_json::json!({}),
        };
        let out = supervisor.execute(&call, &AbilityContext::default()).await;
        assert!(out.is_error);
        assert_eq!(out.content, "Ability not found");
    }

    #[tokio::test]
    async fn name_collision_rejects_load_and_keeps_first_plugin() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("a")).unwrap();
        fs::create_dir(tmp.path().join("b")).unwrap();
        // Both plugins declare the same ability name via manifest fallback
        // (no `initialize` abilities list, so manifest.abilities is used).
        for p in ["a", "b"] {
            let manifest = serde_json::json!({
                "name": p,
                "version": "1.0.0",
                "runtime": { "entry": "true" },
                "abilities": [{"name": "shared", "description": "d"}]
            });
            fs::write(
                tmp.path().join(p).join("manifest.json"),
                serde_json::to_string(&manifest).unwrap(),
            )
            .unwrap();
        }
        let supervisor = PluginSupervisor::new(cfg(tmp.path()), Arc::new(EventBus::new(16)));
        let manifests = supervisor.discover();
        assert_eq!(manifests.len(), 2);
        for manifest in manifests {
            let _ = supervisor.load(manifest, Value::Null).await;
        }
        // Exactly one of the two plugins should have won the name.
        assert_eq!(supervisor.loaded_names().await.len(), 1);
    }
}
