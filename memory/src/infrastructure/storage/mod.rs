// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Storage Infrastructure Module
//!
//! Concrete implementations of the StorageProvider trait.

pub mod local;
pub mod memory;

pub use local::LocalStorageProvider;
pub use memory::InMemoryStorageProvider;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::domain::storage::{StorageProvider, StorageTier};

/// Storage backend configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageBackend {
    /// Process memory (fastest tier, lost on restart)
    Memory {
        id: String,
        capacity_bytes: u64,
        #[serde(default = "default_memory_tier")]
        tier: StorageTier,
    },

    /// Files under a local directory
    Local {
        id: String,
        base_path: PathBuf,
        capacity_bytes: u64,
    },
}

fn default_memory_tier() -> StorageTier {
    StorageTier::Memory
}

/// Factory function to create storage provider from configuration
pub fn create_storage_provider(backend: StorageBackend) -> Arc<dyn StorageProvider> {
    match backend {
        StorageBackend::Memory { id, capacity_bytes, tier } => {
            Arc::new(InMemoryStorageProvider::new(id, capacity_bytes).with_tier(tier))
        }
        StorageBackend::Local { id, base_path, capacity_bytes } => {
            Arc::new(LocalStorageProvider::new(id, base_path, capacity_bytes))
        }
    }
}
