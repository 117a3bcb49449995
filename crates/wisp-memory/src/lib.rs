// Copyright (c) 2024-2026 Wisp Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Layered memory pipeline: ingestion, rule/LLM extraction, three upsertable
//! layer stores (core profile, semantic fact, procedural habit), and
//! scorer-ranked recall (spec §4.6).

mod extractor;
mod pipeline;
mod record;
mod scorer;
mod store;

pub use extractor::{Extractor, LlmExtractor, RuleExtractor};
pub use pipeline::{EmotionSnapshot, MemoryPipeline};
pub use record::{CoreProfile, LayerUpdate, MemoryRecord, MemoryResult, ProceduralHabit, SemanticFact};
pub use scorer::{KeywordOverlapScorer, RecencyScorer, Scorer, ScorerRegistry};
pub use store::{MemoryStore, StoreError};
