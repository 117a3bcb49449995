// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Lightweight skill/agent service layered over the kernel (spec §4.8
//! supplement "Skill / Agent Service"): loads skill and agent definitions
//! from a directory and exposes keyword-overlap search for the dialogue
//! orchestrator's context-assembly step.

mod agents;
mod shared;
mod skills;

use std::collections::HashSet;
use std::path::Path;

pub use agents::{discover_agents, AgentDefinition, SharedAgents};
pub use shared::Shared;
pub use skills::{discover_skills, SharedSkills, SkillDefinition};

/// Loads and live-refreshes skill and agent definitions, and ranks skills
/// against a query by keyword overlap between the query and each skill's
/// trigger keywords plus description (the same technique
/// `wisp-memory`'s `KeywordOverlapScorer` uses for recall ranking).
pub struct SkillService {
    skills: SharedSkills,
    agents: SharedAgents,
}

impl SkillService {
    pub fn new(skills_dir: &Path, agents_dir: &Path) -> Self {
        Self {
            skills: Shared::new(discover_skills(skills_dir)),
            agents: Shared::new(discover_agents(agents_dir)),
        }
    }

    pub fn empty() -> Self {
        Self { skills: Shared::empty(), agents: Shared::empty() }
    }

    /// Re-scans both directories and atomically swaps in the new lists.
    pub fn refresh(&self, skills_dir: &Path, agents_dir: &Path) {
        self.skills.set(discover_skills(skills_dir));
        self.agents.set(discover_agents(agents_dir));
    }

    /// Returns the `top_k` skills with a positive keyword-overlap score
    /// against `query`, highest first.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<SkillDefinition> {
        let query_words: HashSet<String> =
            query.to_lowercase().split_whitespace().map(str::to_string).collect();
        let skills = self.skills.get();
        let mut scored: Vec<(usize, &SkillDefinition)> = skills
            .iter()
            .map(|s| (keyword_overlap(&query_words, s), s))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().take(top_k).map(|(_, s)| s.clone()).collect()
    }

    pub fn get_agent(&self, name: &str) -> Option<AgentDefinition> {
        self.agents.get().iter().find(|a| a.name == name).cloned()
    }

    pub fn list_agents(&self) -> Vec<AgentDefinition> {
        self.agents.get().to_vec()
    }

    pub fn list_skills(&self) -> Vec<SkillDefinition> {
        self.skills.get().to_vec()
    }
}

fn keyword_overlap(query_words: &HashSet<String>, skill: &SkillDefinition) -> usize {
    let mut haystack: HashSet<String> =
        skill.trigger_keywords.iter().map(|k| k.to_lowercase()).collect();
    haystack.extend(skill.description.to_lowercase().split_whitespace().map(str::to_string));
    query_words.intersection(&haystack).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn search_ranks_by_keyword_overlap() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "weather/SKILL.md",
            "---\ndescription: forecasts rain and sunshine\ntrigger_keywords: [weather, forecast]\n---\nReport today's weather.\n",
        );
        write(
            dir.path(),
            "jokes/SKILL.md",
            "---\ndescription: tells jokes\ntrigger_keywords: [joke, funny]\n---\nTell a joke.\n",
        );
        let service = SkillService::new(dir.path(), &dir.path().join("agents"));
        let matches = service.search("what's the weather forecast", 5);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].command, "weather");
    }

    #[test]
    fn search_with_no_overlap_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "weather/SKILL.md", "---\ndescription: forecasts\n---\nbody");
        let service = SkillService::new(dir.path(), &dir.path().join("agents"));
        assert!(service.search("completely unrelated query", 5).is_empty());
    }

    #[test]
    fn refresh_picks_up_newly_added_skill() {
        let dir = tempfile::tempdir().unwrap();
        let service = SkillService::empty();
        assert!(service.list_skills().is_empty());
        write(dir.path(), "new-skill/SKILL.md", "---\ndescription: x\n---\nbody");
        service.refresh(dir.path(), &dir.path().join("agents"));
        assert_eq!(service.list_skills().len(), 1);
    }

    #[test]
    fn get_agent_returns_named_definition() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "helper.md", "---\nname: helper\ndescription: d\n---\nbe helpful");
        let service = SkillService::new(&dir.path().join("skills"), dir.path());
        let agent = service.get_agent("helper").unwrap();
        assert_eq!(agent.system_prompt, "be helpful");
        assert!(service.get_agent("missing").is_none());
    }
}
