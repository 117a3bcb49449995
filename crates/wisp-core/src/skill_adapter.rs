// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Wires [`wisp_skills::SkillService`] into the orchestrator's
//! [`SkillRecall`] port, the same trait-at-the-seam pattern
//! [`crate::memory_adapter`] uses for `MemoryRecall`.

use async_trait::async_trait;
use wisp_skills::SkillService;

use crate::orchestrator::SkillRecall;

#[async_trait]
impl SkillRecall for SkillService {
    async fn search_block(&self, query: &str, top_k: usize) -> Option<String> {
        let matches = self.search(query, top_k);
        if matches.is_empty() {
            return None;
        }
        let mut out = String::from("## Relevant Skills\n");
        for skill in matches {
            out.push_str(&format!("### {}\n{}\n\n{}\n\n", skill.name, skill.description, skill.instructions));
        }
        Some(out)
    }
}
