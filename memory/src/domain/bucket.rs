// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Buckets - named, domain-scoped containers of chunks
//!
//! Buckets form a tree. The tree is stored as an arena ([`BucketTree`]) keyed
//! by [`BucketId`]: a bucket lists its children by id and remembers its parent
//! id for lookups only. A parent is fixed when a bucket is created, so the
//! tree can never contain a cycle.
//!
//! Recursive search merges each subtree's own top-k rather than re-scanning
//! every descendant globally. The result is the union of the per-bucket
//! top-k lists, re-sorted and truncated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::domain::chunk::Chunk;
use crate::domain::vector_index::{sort_by_score, DistanceMetric, ScoredChunk, VectorIndex};
use crate::error::{MemoryError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BucketId(pub Uuid);

impl BucketId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BucketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketConfig {
    pub name: String,
    pub domain: String,
    pub dimension: usize,
    #[serde(default)]
    pub metric: DistanceMetric,
}

impl BucketConfig {
    pub fn new(name: impl Into<String>, domain: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            dimension,
            metric: DistanceMetric::Cosine,
        }
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Bucket {
    pub id: BucketId,
    pub name: String,
    pub domain: String,
    pub created_at: DateTime<Utc>,
    parent: Option<BucketId>,
    children: Vec<BucketId>,
    index: VectorIndex,
}

impl Bucket {
    fn new(config: BucketConfig, parent: Option<BucketId>) -> Self {
        Self {
            id: BucketId::new(),
            name: config.name,
            domain: config.domain,
            created_at: Utc::now(),
            parent,
            children: Vec::new(),
            index: VectorIndex::new(config.dimension, config.metric),
        }
    }

    pub fn parent(&self) -> Option<BucketId> {
        self.parent
    }

    pub fn children(&self) -> &[BucketId] {
        &self.children
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Add a chunk; its domain is always rewritten to this bucket's domain
    pub fn add_chunk(&mut self, mut chunk: Chunk) -> Result<usize> {
        chunk.metadata.domain = self.domain.clone();
        self.index.insert(chunk)
    }

    /// Batched `add_chunk`
    ///
    /// Dimensions are checked for the whole batch before anything is
    /// inserted, so a bad chunk leaves the bucket untouched.
    pub fn add_chunks(&mut self, chunks: Vec<Chunk>) -> Result<Vec<usize>> {
        let dimension = self.index.dimension();
        if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != dimension) {
            return Err(MemoryError::DimensionMismatch {
                expected: dimension,
                actual: bad.embedding.len(),
            });
        }

        chunks.into_iter().map(|chunk| self.add_chunk(chunk)).collect()
    }

    pub fn search_local(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        self.index.search(query, k)
    }

    pub fn local_chunk_count(&self) -> usize {
        self.index.size()
    }

    /// Digest of the newest `max_chunks` chunks' level-1 summaries
    pub fn summarize(&self, max_chunks: usize) -> String {
        let chunks = self.index.chunks();
        if chunks.is_empty() {
            return format!("No chunks in bucket '{}'", self.name);
        }

        let mut newest: Vec<&Chunk> = chunks.iter().collect();
        newest.sort_by(|a, b| b.metadata.timestamp.cmp(&a.metadata.timestamp));

        let mut summary = format!(
            "Bucket '{}' ({}): {} chunks",
            self.name,
            self.domain,
            chunks.len()
        );
        for chunk in newest.into_iter().take(max_chunks) {
            if let Some(level_one) = chunk.summary_at(1) {
                summary.push_str("\n- ");
                summary.push_str(&level_one.content);
            }
        }
        summary
    }
}

/// Arena owning every bucket of one hierarchy
#[derive(Debug, Default)]
pub struct BucketTree {
    buckets: HashMap<BucketId, Bucket>,
    roots: Vec<BucketId>,
}

impl BucketTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_root(&mut self, config: BucketConfig) -> BucketId {
        let bucket = Bucket::new(config, None);
        let id = bucket.id;
        self.buckets.insert(id, bucket);
        self.roots.push(id);
        id
    }

    /// Create a child of `parent`; the parent link is set at construction
    pub fn add_sub_bucket(&mut self, parent: BucketId, config: BucketConfig) -> Result<BucketId> {
        let bucket = Bucket::new(config, Some(parent));
        let id = bucket.id;

        self.get_mut(parent)?.children.push(id);
        self.buckets.insert(id, bucket);
        Ok(id)
    }

    pub fn get(&self, id: BucketId) -> Result<&Bucket> {
        self.buckets.get(&id).ok_or(MemoryError::BucketNotFound(id))
    }

    pub fn get_mut(&mut self, id: BucketId) -> Result<&mut Bucket> {
        self.buckets.get_mut(&id).ok_or(MemoryError::BucketNotFound(id))
    }

    pub fn contains(&self, id: BucketId) -> bool {
        self.buckets.contains_key(&id)
    }

    pub fn roots(&self) -> &[BucketId] {
        &self.roots
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.values()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn add_chunk(&mut self, id: BucketId, chunk: Chunk) -> Result<usize> {
        self.get_mut(id)?.add_chunk(chunk)
    }

    pub fn add_chunks(&mut self, id: BucketId, chunks: Vec<Chunk>) -> Result<Vec<usize>> {
        self.get_mut(id)?.add_chunks(chunks)
    }

    pub fn search(
        &self,
        id: BucketId,
        query: &[f32],
        k: usize,
        recursive: bool,
    ) -> Result<Vec<ScoredChunk>> {
        let bucket = self.get(id)?;
        let mut results = bucket.search_local(query, k)?;

        if !recursive || bucket.children.is_empty() {
            return Ok(results);
        }

        for child in &bucket.children {
            results.extend(self.search(*child, query, k, true)?);
        }

        sort_by_score(&mut results);
        results.truncate(k);
        Ok(results)
    }

    pub fn all_chunks(&self, id: BucketId, recursive: bool) -> Result<Vec<Chunk>> {
        let bucket = self.get(id)?;
        let mut chunks = bucket.index.chunks().to_vec();

        if recursive {
            for child in &bucket.children {
                chunks.extend(self.all_chunks(*child, true)?);
            }
        }
        Ok(chunks)
    }

    pub fn chunk_count(&self, id: BucketId, recursive: bool) -> Result<usize> {
        let bucket = self.get(id)?;
        let mut count = bucket.local_chunk_count();

        if recursive {
            for child in &bucket.children {
                count += self.chunk_count(*child, true)?;
            }
        }
        Ok(count)
    }

    pub fn summarize(&self, id: BucketId, max_chunks: usize) -> Result<String> {
        Ok(self.get(id)?.summarize(max_chunks))
    }
}
