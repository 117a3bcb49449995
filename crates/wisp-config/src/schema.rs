// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_max_history() -> usize {
    50
}

fn default_max_result_chars() -> usize {
    4000
}

fn default_recall_top_k() -> usize {
    5
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_shutdown_timeout_secs() -> u64 {
    5
}

fn default_bus_capacity() -> usize {
    1024
}

fn default_plugins_dir() -> PathBuf {
    PathBuf::from("plugins")
}

fn default_emotion_base_config() -> PathBuf {
    PathBuf::from("emotion.yaml")
}

fn default_characters_dir() -> PathBuf {
    PathBuf::from("characters")
}

fn default_plugin_config_glob() -> String {
    "stars/*/emotion.yaml".to_string()
}

/// Root configuration for the runtime kernel. Sections map onto the
/// components in the component table: session trimming, tool-call
/// truncation, plugin discovery/timeouts, memory recall, and the emotion
/// hot-reload config chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub plugins: PluginsConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub emotion: EmotionFilesConfig,
    #[serde(default)]
    pub bus: BusConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum number of messages retained per session after trimming.
    /// System messages are always retained in full; the remainder is
    /// trimmed from the head.
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
        }
    }
}

/// A "star" — a configurable unit (a built-in group or a loaded plugin)
/// with an enable/allow-tools toggle and per-ability sub-toggles, used by
/// the capability scheduler for policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StarConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub allow_tools: bool,
    /// Per-ability override; absent entries default to `enabled`.
    #[serde(default)]
    pub abilities: HashMap<String, bool>,
}

impl Default for StarConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            allow_tools: default_true(),
            abilities: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Tool results longer than this are truncated before insertion into
    /// context (head/tail, with an omission marker).
    #[serde(default = "default_max_result_chars")]
    pub max_result_chars: usize,
    /// Keyed by star name: `"builtin"`, `"mcp"`, or a plugin name.
    #[serde(default)]
    pub stars: HashMap<String, StarConfig>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            max_result_chars: default_max_result_chars(),
            stars: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Directory walked for plugin subdirectories (each containing a
    /// `manifest.json`).
    #[serde(default = "default_plugins_dir")]
    pub directory: PathBuf,
    #[serde(default = "default_timeout_secs")]
    pub execute_timeout_secs: u64,
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
    /// Run the language-appropriate dependency install step (pip/npm/go mod)
    /// before spawning, iff the plugin directory contains the relevant
    /// marker file.
    #[serde(default)]
    pub install_dependencies: bool,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            directory: default_plugins_dir(),
            execute_timeout_secs: default_timeout_secs(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            install_dependencies: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_recall_top_k")]
    pub recall_top_k: usize,
    /// Attach an emotion snapshot to each ingested record.
    #[serde(default = "default_true")]
    pub emotion_on_ingest: bool,
    /// Use the LLM-based extractor in addition to the rule-based one.
    #[serde(default)]
    pub llm_extraction: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            recall_top_k: default_recall_top_k(),
            emotion_on_ingest: default_true(),
            llm_extraction: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionFilesConfig {
    /// Base lexicon/rule config, lowest priority in the overlay chain.
    #[serde(default = "default_emotion_base_config")]
    pub base_config_path: PathBuf,
    /// Glob (relative to the data dir) matching plugin-contributed overlay
    /// files, applied in sorted-path order after the base config.
    #[serde(default = "default_plugin_config_glob")]
    pub plugin_config_glob: String,
    /// Directory holding `<character>.yaml` overlays, applied last.
    #[serde(default = "default_characters_dir")]
    pub characters_dir: PathBuf,
}

impl Default for EmotionFilesConfig {
    fn default() -> Self {
        Self {
            base_config_path: default_emotion_base_config(),
            plugin_config_glob: default_plugin_config_glob(),
            characters_dir: default_characters_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Bound on the async publish queue; beyond this, `publish` blocks.
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: default_bus_capacity(),
        }
    }
}

/// Default top-k for skill-recall context injection, shared so the
/// orchestrator and skill service agree on it without a duplicated literal.
pub const DEFAULT_SKILL_TOP_K: usize = 3;
