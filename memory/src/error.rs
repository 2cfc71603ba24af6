// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Error taxonomy for the memory layer
//!
//! Every failure surfaced by the crate is a [`MemoryError`]. Callers that only
//! care about the broad category (retry on `Unavailable`, surface
//! `Validation` to the user, ...) match on [`MemoryError::kind`].

use thiserror::Error;

use crate::domain::chunk::ChunkId;
use crate::domain::bucket::BucketId;
use crate::domain::storage::StorageError;

pub type Result<T> = std::result::Result<T, MemoryError>;

/// Broad error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input (dimension mismatch, bad metadata, bad config)
    Validation,
    /// A required collaborator is missing or disconnected
    Unavailable,
    /// A referenced location, bucket or provider does not exist
    NotFound,
    /// No provider has room for the payload
    Capacity,
    /// A multi-step transaction rolled back
    Transaction,
    /// Integrity check failed (raised by collaborators)
    Integrity,
    /// A storage backend call failed
    Storage,
    /// Encoding or decoding a chunk failed
    Serialization,
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No embedder configured")]
    EmbeddingUnavailable,

    #[error("Embedding failed: {0}")]
    EmbeddingFailed(String),

    #[error("Summarization failed: {0}")]
    SummarizationFailed(String),

    #[error("No storage provider available for chunk {chunk_id}{}", describe_last_error(.last_error))]
    NoProviderAvailable {
        chunk_id: ChunkId,
        last_error: Option<Box<MemoryError>>,
    },

    #[error("Insufficient capacity for chunk {chunk_id}: no connected provider has {required_bytes} bytes available")]
    InsufficientCapacity { chunk_id: ChunkId, required_bytes: u64 },

    #[error("No storage location recorded for chunk {0}")]
    LocationNotFound(ChunkId),

    #[error("Storage provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Bucket not found: {0}")]
    BucketNotFound(BucketId),

    #[error("Failed to deserialize chunk {chunk_id}: {reason}")]
    DeserializationFailed { chunk_id: ChunkId, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Transaction rolled back: {source}")]
    Transaction {
        #[source]
        source: Box<MemoryError>,
        compensation_warnings: Vec<String>,
    },

    #[error("Integrity check failed: {0}")]
    Integrity(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

fn describe_last_error(last_error: &Option<Box<MemoryError>>) -> String {
    match last_error {
        Some(err) => format!(" (last error: {})", err),
        None => String::new(),
    }
}

impl MemoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MemoryError::DimensionMismatch { .. }
            | MemoryError::InvalidMetadata(_)
            | MemoryError::InvalidConfig(_) => ErrorKind::Validation,
            MemoryError::EmbeddingUnavailable
            | MemoryError::EmbeddingFailed(_)
            | MemoryError::SummarizationFailed(_)
            | MemoryError::NoProviderAvailable { .. } => ErrorKind::Unavailable,
            MemoryError::LocationNotFound(_)
            | MemoryError::ProviderNotFound(_)
            | MemoryError::BucketNotFound(_) => ErrorKind::NotFound,
            MemoryError::InsufficientCapacity { .. } => ErrorKind::Capacity,
            MemoryError::Transaction { .. } => ErrorKind::Transaction,
            MemoryError::Integrity(_) => ErrorKind::Integrity,
            MemoryError::Storage(_) | MemoryError::Operation(_) => ErrorKind::Storage,
            MemoryError::DeserializationFailed { .. } | MemoryError::Serialization(_) => {
                ErrorKind::Serialization
            }
        }
    }
}

impl From<serde_json::Error> for MemoryError {
    fn from(err: serde_json::Error) -> Self {
        MemoryError::Serialization(err.to_string())
    }
}
