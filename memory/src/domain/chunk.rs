// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Chunk - the unit of content held in memory
//!
//! A chunk carries its content, the embedding used for similarity search,
//! structured metadata and an ordered list of summaries. Chunks are immutable
//! after creation apart from metadata enrichment (e.g. an integrity hash
//! written into `extra` by a collaborator).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId(pub Uuid);

impl ChunkId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChunkId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chunk metadata
///
/// The required fields are closed; anything else a caller wants to attach
/// goes into `extra`. Its keys serialize flat next to the required fields,
/// ordered for stable output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Domain of the owning bucket (overwritten on insertion into a bucket)
    pub domain: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ChunkMetadata {
    pub fn new(domain: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            timestamp: Utc::now(),
            source: source.into(),
            tags: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Layer caller-supplied overrides on top of these values
    pub fn merged_with(mut self, overrides: MetadataOverrides) -> Self {
        if let Some(domain) = overrides.domain {
            self.domain = domain;
        }
        if let Some(timestamp) = overrides.timestamp {
            self.timestamp = timestamp;
        }
        if let Some(source) = overrides.source {
            self.source = source;
        }
        if let Some(tags) = overrides.tags {
            self.tags = tags;
        }
        self.extra.extend(overrides.extra);
        self
    }
}

/// Partial metadata supplied by callers of `create_chunk`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataOverrides {
    pub domain: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub tags: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl MetadataOverrides {
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// One level of a chunk's summary pyramid (level 1 is the most detailed)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSummary {
    pub level: u32,
    pub content: String,
    #[serde(default)]
    pub concepts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
    #[serde(default)]
    pub summaries: Vec<ChunkSummary>,
}

impl Chunk {
    pub fn new(content: impl Into<String>, embedding: Vec<f32>, metadata: ChunkMetadata) -> Self {
        Self {
            id: ChunkId::new(),
            content: content.into(),
            embedding,
            metadata,
            summaries: Vec::new(),
        }
    }

    pub fn with_summaries(mut self, summaries: Vec<ChunkSummary>) -> Self {
        self.summaries = summaries;
        self
    }

    pub fn summary_at(&self, level: u32) -> Option<&ChunkSummary> {
        self.summaries.iter().find(|s| s.level == level)
    }

    /// Encode the chunk the way it is handed to storage providers
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
