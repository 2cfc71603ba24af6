// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Per-bucket vector index
//!
//! Linear scan over every stored embedding. There is no approximate index:
//! buckets are expected to stay small enough that an exact scan is cheap, and
//! results are deterministic (ties keep insertion order).
//!
//! Scores are always "higher is better":
//! - cosine: dot product of L2-normalized vectors, in `[-1, 1]`
//! - euclidean: negative L2 distance
//! - dot: raw dot product

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::domain::chunk::Chunk;
use crate::error::{MemoryError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
    Dot,
}

/// A search hit
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    metric: DistanceMetric,
    chunks: Vec<Chunk>,
}

impl VectorIndex {
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            chunks: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Insert a chunk, returning its sequential position
    ///
    /// Under the cosine metric the stored embedding is normalized; a zero
    /// vector is stored unchanged.
    pub fn insert(&mut self, mut chunk: Chunk) -> Result<usize> {
        if chunk.embedding.len() != self.dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: self.dimension,
                actual: chunk.embedding.len(),
            });
        }

        if self.metric == DistanceMetric::Cosine {
            normalize(&mut chunk.embedding);
        }

        self.chunks.push(chunk);
        Ok(self.chunks.len() - 1)
    }

    /// Top-`k` chunks by descending score
    ///
    /// An empty index answers any query (including an empty sentinel vector)
    /// with no results.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if self.chunks.is_empty() {
            return Ok(Vec::new());
        }

        if query.len() != self.dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let query = match self.metric {
            DistanceMetric::Cosine => {
                let mut normalized = query.to_vec();
                normalize(&mut normalized);
                normalized
            }
            _ => query.to_vec(),
        };

        let mut scored: Vec<ScoredChunk> = self
            .chunks
            .iter()
            .map(|chunk| ScoredChunk {
                score: self.score(&query, &chunk.embedding),
                chunk: chunk.clone(),
            })
            .collect();

        // sort_by is stable: equal scores stay in insertion order
        sort_by_score(&mut scored);
        scored.truncate(k);

        Ok(scored)
    }

    pub fn size(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    fn score(&self, query: &[f32], stored: &[f32]) -> f32 {
        match self.metric {
            DistanceMetric::Cosine | DistanceMetric::Dot => dot(query, stored),
            DistanceMetric::Euclidean => {
                let squared: f32 = query
                    .iter()
                    .zip(stored.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                -squared.sqrt()
            }
        }
    }
}

/// Sort hits by descending score, keeping the existing order for ties
pub fn sort_by_score(results: &mut [ScoredChunk]) {
    results.sort_by(|a, b| descending_score(a.score, b.score));
}

/// Highest score first under a total order; NaN ranks after every number
pub fn descending_score(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn normalize(vector: &mut [f32]) {
    let magnitude = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value /= magnitude;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chunk::ChunkMetadata;

    fn chunk(content: &str, embedding: Vec<f32>) -> Chunk {
        Chunk::new(content, embedding, ChunkMetadata::new("default", "user"))
    }

    fn unit_index(metric: DistanceMetric) -> VectorIndex {
        let mut index = VectorIndex::new(3, metric);
        index.insert(chunk("x", vec![1.0, 0.0, 0.0])).unwrap();
        index.insert(chunk("y", vec![0.0, 1.0, 0.0])).unwrap();
        index.insert(chunk("z", vec![0.0, 0.0, 1.0])).unwrap();
        index
    }

    #[test]
    fn test_cosine_top_result() {
        let index = unit_index(DistanceMetric::Cosine);

        let results = index.search(&[0.9, 0.1, 0.1], 1).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.content, "x");
        assert!(results[0].score > 0.9);
    }

    #[test]
    fn test_insert_returns_positions() {
        let mut index = VectorIndex::new(2, DistanceMetric::Dot);
        assert_eq!(index.insert(chunk("a", vec![1.0, 0.0])).unwrap(), 0);
        assert_eq!(index.insert(chunk("b", vec![0.0, 1.0])).unwrap(), 1);
        assert_eq!(index.size(), 2);
    }

    #[test]
    fn test_dimension_mismatch_leaves_index_unchanged() {
        let mut index = unit_index(DistanceMetric::Cosine);

        let err = index.insert(chunk("bad", vec![1.0, 2.0])).unwrap_err();

        assert!(matches!(err, MemoryError::DimensionMismatch { expected: 3, actual: 2 }));
        assert_eq!(index.size(), 3);
    }

    #[test]
    fn test_query_dimension_checked_unless_empty() {
        let empty = VectorIndex::new(3, DistanceMetric::Cosine);
        assert!(empty.search(&[], 5).unwrap().is_empty());

        let index = unit_index(DistanceMetric::Cosine);
        assert!(matches!(
            index.search(&[], 5),
            Err(MemoryError::DimensionMismatch { expected: 3, actual: 0 })
        ));
    }

    #[test]
    fn test_cosine_normalizes_stored_vectors() {
        let mut index = VectorIndex::new(2, DistanceMetric::Cosine);
        index.insert(chunk("long", vec![3.0, 4.0])).unwrap();
        index.insert(chunk("zero", vec![0.0, 0.0])).unwrap();

        let stored = &index.chunks()[0].embedding;
        assert!((stored[0] - 0.6).abs() < 1e-6);
        assert!((stored[1] - 0.8).abs() < 1e-6);
        assert_eq!(index.chunks()[1].embedding, vec![0.0, 0.0]);
    }

    #[test]
    fn test_euclidean_scores_are_negative_distances() {
        let index = unit_index(DistanceMetric::Euclidean);

        let results = index.search(&[1.0, 0.0, 0.0], 3).unwrap();

        assert_eq!(results[0].chunk.content, "x");
        assert_eq!(results[0].score, 0.0);
        assert!((results[1].score + 2f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_dot_uses_raw_magnitudes() {
        let mut index = VectorIndex::new(2, DistanceMetric::Dot);
        index.insert(chunk("small", vec![1.0, 0.0])).unwrap();
        index.insert(chunk("large", vec![5.0, 0.0])).unwrap();

        let results = index.search(&[2.0, 0.0], 2).unwrap();

        assert_eq!(results[0].chunk.content, "large");
        assert_eq!(results[0].score, 10.0);
        assert_eq!(results[1].score, 2.0);
    }

    #[test]
    fn test_ties_keep_insertion_order_and_results_are_sorted() {
        let mut index = VectorIndex::new(2, DistanceMetric::Dot);
        for name in ["first", "second", "third"] {
            index.insert(chunk(name, vec![1.0, 1.0])).unwrap();
        }
        index.insert(chunk("best", vec![2.0, 2.0])).unwrap();

        let results = index.search(&[1.0, 1.0], 3).unwrap();

        let names: Vec<_> = results.iter().map(|r| r.chunk.content.as_str()).collect();
        assert_eq!(names, vec!["best", "first", "second"]);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_nan_scores_rank_last() {
        let mut hits: Vec<ScoredChunk> = [("nan-a", f32::NAN), ("low", -1.0), ("nan-b", f32::NAN), ("high", 3.0), ("mid", 0.5)]
            .into_iter()
            .map(|(name, score)| ScoredChunk {
                chunk: chunk(name, vec![1.0, 0.0]),
                score,
            })
            .collect();

        sort_by_score(&mut hits);

        let names: Vec<_> = hits.iter().map(|h| h.chunk.content.as_str()).collect();
        assert_eq!(names, vec!["high", "mid", "low", "nan-a", "nan-b"]);
        assert_eq!(descending_score(1.0, f32::NAN), Ordering::Less);
        assert_eq!(descending_score(f32::NAN, f32::NAN), Ordering::Equal);
    }
}
