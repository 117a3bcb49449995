// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Wires [`wisp_memory::MemoryPipeline`] into the orchestrator's
//! [`MemoryRecall`] port. A local trait implemented for a foreign type is
//! allowed under the orphan rule since the trait lives in this crate; this
//! keeps the orchestrator decoupled from the memory pipeline's concrete
//! record/result types while still reusing its real implementation.

use async_trait::async_trait;
use wisp_memory::MemoryPipeline;

use crate::orchestrator::MemoryRecall;

#[async_trait]
impl MemoryRecall for MemoryPipeline {
    async fn recall_block(&self, query: &str, session_id: &str, top_k: usize) -> Option<String> {
        self.render_recall_block(query, session_id, top_k).await
    }
}
