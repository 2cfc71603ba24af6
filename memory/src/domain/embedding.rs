// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Ports for the external embedding and summarization services

use async_trait::async_trait;

use crate::domain::chunk::ChunkSummary;
use crate::error::Result;

/// Turns text into a vector for similarity search
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Produces a multi-level summary of a text (level 1 first)
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str, levels: u32) -> Result<Vec<ChunkSummary>>;
}
