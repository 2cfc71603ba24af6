// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Storage Provider Trait - Anti-Corruption Layer for chunk backends
//!
//! Abstracts the concrete backends (in-memory, local filesystem, cloud
//! drives, ...) that serialized chunks are placed on. The memory manager only
//! sees this trait: a tier for placement ordering, a connectivity flag, a
//! quota snapshot and opaque store/retrieve/delete calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Placement preference rank, cheapest/fastest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StorageTier {
    Memory,
    Local,
    Cloud,
    Platform,
    Extended,
}

impl fmt::Display for StorageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageTier::Memory => "MEMORY",
            StorageTier::Local => "LOCAL",
            StorageTier::Cloud => "CLOUD",
            StorageTier::Platform => "PLATFORM",
            StorageTier::Extended => "EXTENDED",
        };
        f.write_str(name)
    }
}

/// Where a chunk's bytes live: provider id plus a provider-opaque key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageLocation {
    pub provider_id: String,
    pub key: String,
}

impl StorageLocation {
    pub fn new(provider_id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            key: key.into(),
        }
    }
}

/// Quota snapshot in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StorageQuota {
    pub used: u64,
    pub total: u64,
    pub available: u64,
}

impl StorageQuota {
    pub fn new(used: u64, total: u64) -> Self {
        Self {
            used,
            total,
            available: total.saturating_sub(used),
        }
    }

    /// Usage as a percentage of total, `None` when total is zero
    pub fn usage_percent(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.used as f64 * 100.0 / self.total as f64)
        }
    }
}

/// Descriptive metadata passed along with stored bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Stable identifier of the stored object (the chunk id)
    pub object_id: String,
    pub domain: String,
    pub content_type: String,
}

/// Storage backend contract
///
/// Implementations must be cheap to share (`Arc<dyn StorageProvider>`); all
/// mutation happens behind `&self`.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn tier(&self) -> StorageTier;

    fn is_connected(&self) -> bool;

    async fn connect(&self) -> Result<(), StorageError>;

    async fn disconnect(&self) -> Result<(), StorageError>;

    /// Store bytes and return the location they can be read back from
    async fn store(&self, data: &[u8], metadata: &ObjectMetadata) -> Result<StorageLocation, StorageError>;

    async fn retrieve(&self, location: &StorageLocation) -> Result<Vec<u8>, StorageError>;

    async fn exists(&self, location: &StorageLocation) -> Result<bool, StorageError>;

    /// Delete an object, returning whether anything was removed
    async fn delete(&self, location: &StorageLocation) -> Result<bool, StorageError>;

    async fn get_quota(&self) -> Result<StorageQuota, StorageError>;
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Quota exceeded: provider={provider_id}, requested={requested_bytes}, available={available_bytes}")]
    QuotaExceeded {
        provider_id: String,
        requested_bytes: u64,
        available_bytes: u64,
    },

    #[error("Provider not connected: {0}")]
    NotConnected(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout while communicating with storage backend")]
    Timeout,

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Unknown storage error: {0}")]
    Unknown(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError(err.to_string())
    }
}
