// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Wires [`wisp_emotion::EmotionService`] into the memory pipeline's
//! [`EmotionSnapshot`] port, the same trait-at-the-seam pattern
//! [`crate::memory_adapter`] uses for `MemoryRecall`.

use async_trait::async_trait;
use serde_json::Value;
use wisp_emotion::EmotionService;
use wisp_memory::EmotionSnapshot;

#[async_trait]
impl EmotionSnapshot for EmotionService {
    async fn snapshot(&self, text: &str) -> Option<Value> {
        self.snapshot_value(text)
    }
}
