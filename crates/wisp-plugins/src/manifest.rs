// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Plugin manifest parsing and discovery (spec §4.4 "Discovery",
//! §6 "Manifest (`manifest.json`)").

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// `^[a-z0-9][a-z0-9_-]{0,62}$` — plugin names double as `tools.stars.<name>`
/// config keys and ability-collision log fields, so they're kept
/// filesystem- and YAML-key-safe.
fn is_valid_plugin_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_lowercase() || first.is_ascii_digit()) {
        return false;
    }
    if name.len() > 63 {
        return false;
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Stdio,
    Http,
}

impl Default for Transport {
    fn default() -> Self {
        Transport::Stdio
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Runtime {
    pub language: Option<String>,
    pub entry: Option<String>,
    pub command: Option<String>,
    #[serde(default)]
    pub transport: Transport,
    pub http_url: Option<String>,
}

impl Runtime {
    /// The command string to run for `stdio` transport: `entry` if present,
    /// else `command` (spec §4.4 step 1: "reject if required fields absent
    /// (`name`, `version`, `entry`/`command`)").
    pub fn command_line(&self) -> Option<&str> {
        self.entry.as_deref().or(self.command.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclaredAbility {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_params_schema")]
    pub parameters: Value,
}

fn default_params_schema() -> Value {
    serde_json::json!({ "type": "object" })
}

/// Parsed `manifest.json` for one plugin directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub runtime: Runtime,
    /// Accepts any of `abilities`, `skills`, or `tools` as the declared-set
    /// key, matching the heterogeneous SDK aliasing in spec §4.4/§6.
    #[serde(default, alias = "skills", alias = "tools")]
    pub abilities: Vec<DeclaredAbility>,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub config_schema: Option<Value>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Directory the manifest was read from; not part of the JSON, filled
    /// in by [`discover`].
    #[serde(skip)]
    pub dir: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("invalid plugin name: {0}")]
    InvalidName(String),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("failed to read manifest.json: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest.json: {0}")]
    Parse(#[from] serde_json::Error),
}

impl PluginManifest {
    pub fn parse(raw: &str, dir: PathBuf) -> Result<Self, ManifestError> {
        let mut manifest: PluginManifest = serde_json::from_str(raw)?;
        if manifest.name.is_empty() {
            return Err(ManifestError::MissingField("name"));
        }
        if manifest.version.is_empty() {
            return Err(ManifestError::MissingField("version"));
        }
        if manifest.runtime.command_line().is_none() {
            return Err(ManifestError::MissingField("runtime.entry"));
        }
        if !is_valid_plugin_name(&manifest.name) {
            return Err(ManifestError::InvalidName(manifest.name.clone()));
        }
        manifest.dir = dir;
        Ok(manifest)
    }
}

/// Walk `plugins_dir`; every immediate subdirectory not starting with `_`
/// that contains a `manifest.json` contributes one manifest. Manifests that
/// fail to parse or fail name validation are skipped with a warning rather
/// than aborting discovery (spec §4.4 "Discovery").
pub fn discover(plugins_dir: &Path) -> Vec<PluginManifest> {
    let Ok(entries) = std::fs::read_dir(plugins_dir) else {
        return Vec::new();
    };

    let mut manifests = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(dir_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if dir_name.starts_with('_') {
            continue;
        }
        let manifest_path = path.join("manifest.json");
        let raw = match std::fs::read_to_string(&manifest_path) {
            Ok(raw) => raw,
            Err(_) => continue,
        };
        match PluginManifest::parse(&raw, path.clone()) {
            Ok(manifest) => manifests.push(manifest),
            Err(e) => warn!(dir = %path.display(), error = %e, "skipping invalid plugin manifest"),
        }
    }
    manifests
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_manifest(dir: &Path, json: &str) {
        fs::write(dir.join("manifest.json"), json).unwrap();
    }

    #[test]
    fn valid_names_accepted() {
        for name in ["a", "plugin1", "my-plugin", "my_plugin_2"] {
            assert!(is_valid_plugin_name(name), "{name} should be valid");
        }
    }

    #[test]
    fn invalid_names_rejected() {
        for name in ["", "Plugin", "_plugin", "-plugin", "plugin!", "plugin/x"] {
            assert!(!is_valid_plugin_name(name), "{name} should be invalid");
        }
    }

    #[test]
    fn parse_rejects_missing_entry_and_command() {
        let raw = r#"{"name":"demo","version":"1.0.0","runtime":{}}"#;
        let err = PluginManifest::parse(raw, PathBuf::new()).unwrap_err();
        assert!(matches!(err, ManifestError::MissingField("runtime.entry")));
    }

    #[test]
    fn parse_rejects_invalid_name() {
        let raw = r#"{"name":"Bad Name","version":"1.0.0","runtime":{"entry":"python main.py"}}"#;
        let err = PluginManifest::parse(raw, PathBuf::new()).unwrap_err();
        assert!(matches!(err, ManifestError::InvalidName(_)));
    }

    #[test]
    fn parse_accepts_command_alias_for_entry() {
        let raw = r#"{"name":"demo","version":"1.0.0","runtime":{"command":"node index.js"}}"#;
        let manifest = PluginManifest::parse(raw, PathBuf::new()).unwrap();
        assert_eq!(manifest.runtime.command_line(), Some("node index.js"));
    }

    #[test]
    fn parse_accepts_tools_alias_for_abilities() {
        let raw = r#"{
            "name": "demo",
            "version": "1.0.0",
            "runtime": {"entry": "python main.py"},
            "tools": [{"name": "echo", "description": "echoes"}]
        }"#;
        let manifest = PluginManifest::parse(raw, PathBuf::new()).unwrap();
        assert_eq!(manifest.abilities.len(), 1);
        assert_eq!(manifest.abilities[0].name, "echo");
    }

    #[test]
    fn discover_skips_underscore_prefixed_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let good = tmp.path().join("good-plugin");
        let hidden = tmp.path().join("_disabled");
        fs::create_dir(&good).unwrap();
        fs::create_dir(&hidden).unwrap();
        write_manifest(
            &good,
            r#"{"name":"good-plugin","version":"1.0.0","runtime":{"entry":"python main.py"}}"#,
        );
        write_manifest(
            &hidden,
            r#"{"name":"disabled","version":"1.0.0","runtime":{"entry":"python main.py"}}"#,
        );
        let manifests = discover(tmp.path());
        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests[0].name, "good-plugin");
    }

    #[test]
    fn discover_skips_dirs_without_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("no-manifest-here")).unwrap();
        assert!(discover(tmp.path()).is_empty());
    }

    #[test]
    fn discover_skips_invalid_manifest_with_warning_not_panic() {
        let tmp = tempfile::tempdir().unwrap();
        let bad = tmp.path().join("bad-plugin");
        fs::create_dir(&bad).unwrap();
        write_manifest(&bad, "not json");
        assert!(discover(tmp.path()).is_empty());
    }
}
