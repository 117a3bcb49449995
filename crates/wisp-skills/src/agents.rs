// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Named sub-persona registry (spec §4.8 supplement "Skill / Agent
//! Service"): loads agent definitions with a system-prompt override from a
//! directory of markdown files, one agent per file.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::shared::Shared;
use crate::skills::split_frontmatter;

#[derive(Debug, Clone, Default, Deserialize)]
struct Frontmatter {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: String,
}

/// A named sub-persona: its own system-prompt override, substitutable for
/// the default session system prompt.
#[derive(Debug, Clone)]
pub struct AgentDefinition {
    pub name: String,
    pub description: String,
    pub system_prompt: String,
}

pub type SharedAgents = Shared<AgentDefinition>;

/// Loads one [`AgentDefinition`] per `*.md` file directly under `dir`.
/// Missing or unreadable directories yield an empty list.
pub fn discover_agents(dir: &Path) -> Vec<AgentDefinition> {
    let mut out = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return out;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let stem = path.file_stem().unwrap().to_string_lossy().to_string();
        match fs::read_to_string(&path) {
            Ok(raw) => out.push(parse_agent(stem, &raw)),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to read agent definition"),
        }
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    out
}

fn parse_agent(stem: String, raw: &str) -> AgentDefinition {
    let (frontmatter, body) = split_frontmatter(raw);
    let meta: Frontmatter = frontmatter
        .and_then(|fm| serde_yaml::from_str(fm).ok())
        .unwrap_or_default();
    AgentDefinition {
        name: meta.name.unwrap_or(stem),
        description: meta.description,
        system_prompt: body.trim().to_string(),
    }
}
