// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Skill discovery: loads `SKILL.md` packages from a directory (spec §4.8
//! supplement "Skill / Agent Service").
//!
//! A skill is a subdirectory of the skills root containing a `SKILL.md`
//! file: YAML frontmatter (`name`, `description`, `trigger_keywords`)
//! followed by a body used verbatim as the skill's instructions.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::shared::Shared;

#[derive(Debug, Clone, Default, Deserialize)]
struct Frontmatter {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    trigger_keywords: Vec<String>,
}

/// A fully parsed skill definition.
#[derive(Debug, Clone)]
pub struct SkillDefinition {
    /// Directory name relative to the skills root; the lookup key.
    pub command: String,
    pub name: String,
    pub description: String,
    /// Markdown body, used verbatim as the context block injected for a match.
    pub instructions: String,
    pub trigger_keywords: Vec<String>,
}

pub type SharedSkills = Shared<SkillDefinition>;

/// Loads every immediate subdirectory of `dir` that contains a `SKILL.md`
/// (matched case-insensitively). Missing or unreadable directories yield an
/// empty list rather than an error — skill discovery is best-effort.
pub fn discover_skills(dir: &Path) -> Vec<SkillDefinition> {
    let mut out = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return out;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(skill_md) = find_skill_md(&path) else {
            continue;
        };
        let command = path.file_name().unwrap().to_string_lossy().to_string();
        match fs::read_to_string(&skill_md) {
            Ok(raw) => out.push(parse_skill(command, &raw)),
            Err(e) => warn!(path = %skill_md.display(), error = %e, "failed to read SKILL.md"),
        }
    }
    out.sort_by(|a, b| a.command.cmp(&b.command));
    out
}

fn find_skill_md(dir: &Path) -> Option<PathBuf> {
    fs::read_dir(dir).ok()?.filter_map(|e| e.ok()).map(|e| e.path()).find(|p| {
        p.file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.eq_ignore_ascii_case("SKILL.md"))
            .unwrap_or(false)
    })
}

fn parse_skill(command: String, raw: &str) -> SkillDefinition {
    let (frontmatter, body) = split_frontmatter(raw);
    let meta: Frontmatter = frontmatter
        .and_then(|fm| serde_yaml::from_str(fm).ok())
        .unwrap_or_default();
    SkillDefinition {
        name: meta.name.unwrap_or_else(|| command.clone()),
        description: meta.description,
        instructions: body.trim().to_string(),
        trigger_keywords: meta.trigger_keywords,
        command,
    }
}

/// Splits a leading `---`-fenced YAML frontmatter block from the rest of the
/// document. Returns `(None, raw)` if there's no well-formed fence.
pub(crate) fn split_frontmatter(raw: &str) -> (Option<&str>, &str) {
    let trimmed = raw.trim_start();
    if let Some(rest) = trimmed.strip_prefix("---") {
        let rest = rest.strip_prefix('\n').unwrap_or(rest);
        if let Some(end) = rest.find("\n---") {
            let frontmatter = &rest[..end];
            let after = &rest[end + 4..];
            let body = after.strip_prefix('\n').unwrap_or(after);
            return (Some(frontmatter), body);
        }
    }
    (None, trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn missing_directory_yields_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let skills = discover_skills(&dir.path().join("does-not-exist"));
        assert!(skills.is_empty());
    }

    #[test]
    fn discovers_skill_with_frontmatter() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "greeter/SKILL.md",
            "---\nname: Greeter\ndescription: says hello\ntrigger_keywords: [hello, hi]\n---\nSay hello warmly.\n",
        );
        let skills = discover_skills(dir.path());
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].command, "greeter");
        assert_eq!(skills[0].name, "Greeter");
        assert_eq!(skills[0].trigger_keywords, vec!["hello", "hi"]);
        assert_eq!(skills[0].instructions, "Say hello warmly.");
    }

    #[test]
    fn directory_without_skill_md_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "not-a-skill/README.md", "nope");
        assert!(discover_skills(dir.path()).is_empty());
    }

    #[test]
    fn skill_md_is_matched_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "x/skill.md", "---\ndescription: d\n---\nbody");
        let skills = discover_skills(dir.path());
        assert_eq!(skills.len(), 1);
    }

    #[test]
    fn missing_frontmatter_falls_back_to_directory_name() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "raw-skill/SKILL.md", "just a body, no frontmatter");
        let skills = discover_skills(dir.path());
        assert_eq!(skills[0].name, "raw-skill");
        assert_eq!(skills[0].instructions, "just a body, no frontmatter");
    }
}
