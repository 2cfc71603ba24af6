// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Hash-based embedder
//!
//! Deterministic stand-in for a real embedding service, used in development
//! and tests. Identical text always yields an identical vector; different
//! text yields (almost always) different vectors. It carries no semantic
//! signal.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::domain::embedding::Embedder;
use crate::error::Result;

pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        // matches all-MiniLM-L6-v2
        Self::new(384)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let hash = hasher.finish();

        // Map each bit to +/-1 so vectors are never all-zero
        let embedding = (0..self.dimension)
            .map(|i| {
                let bit = (hash >> (i % 64)) & 1;
                if bit == 1 { 1.0 } else { -1.0 }
            })
            .collect();

        Ok(embedding)
    }
}
