// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Command-line surface for the kernel: an interactive chat REPL plus a
//! handful of inspection/management subcommands. No HTTP/WS façade is
//! exposed by this binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "wisp", version, about = "AI-companion runtime kernel", long_about = None)]
pub struct Cli {
    /// Explicit config file, merged on top of the discovered config layers.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding persistent state: memory.db, emotion config chain,
    /// skills/, agents/. Defaults to the OS data directory.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive chat session (default when no subcommand is given).
    Chat {
        /// Provider id to use; defaults to the kernel's default provider.
        #[arg(long)]
        provider: Option<String>,
        /// Disable the tool-call loop for this session.
        #[arg(long)]
        no_tools: bool,
    },
    /// Print the effective merged configuration as YAML.
    ShowConfig,
    /// List models in the bundled static catalog.
    ListModels,
    /// List providers registered in this process.
    ListProviders,
    /// Manage discovered plugins.
    Plugins {
        #[command(subcommand)]
        command: PluginCommands,
    },
    /// Generate shell completions.
    Completions { shell: clap_complete::Shell },
}

#[derive(Subcommand, Debug)]
pub enum PluginCommands {
    /// Discover and load every plugin under the configured plugins directory.
    LoadAll,
    /// List currently loaded plugins.
    List,
    /// Reload one plugin by name.
    Reload { name: String },
    /// Unload one plugin by name.
    Unload { name: String },
}
