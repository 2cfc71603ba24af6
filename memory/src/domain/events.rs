// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain events for the memory layer
//! Published to the EventBus for observability and integration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::alert::Alert;
use super::chunk::ChunkId;
use super::storage::{StorageLocation, StorageTier};
use super::transaction::TransactionId;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemoryEvent {
    /// A chunk was embedded and assembled
    ChunkCreated {
        chunk_id: ChunkId,
        domain: String,
        summary_levels: usize,
        timestamp: DateTime<Utc>,
    },

    /// A chunk was placed on a provider
    ChunkStored {
        chunk_id: ChunkId,
        location: StorageLocation,
        tier: StorageTier,
        size_bytes: u64,
        timestamp: DateTime<Utc>,
    },

    ChunkDeleted {
        chunk_id: ChunkId,
        location: StorageLocation,
        timestamp: DateTime<Utc>,
    },

    /// A chunk moved between providers
    ChunkMigrated {
        chunk_id: ChunkId,
        from: StorageLocation,
        to: StorageLocation,
        timestamp: DateTime<Utc>,
    },

    TransactionCommitted {
        transaction_id: TransactionId,
        operations: usize,
        timestamp: DateTime<Utc>,
    },

    TransactionRolledBack {
        transaction_id: TransactionId,
        failed_step: usize,
        error: String,
        compensation_warnings: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    AlertRaised {
        alert: Alert,
    },
}

impl MemoryEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            MemoryEvent::ChunkCreated { .. } => "chunk_created",
            MemoryEvent::ChunkStored { .. } => "chunk_stored",
            MemoryEvent::ChunkDeleted { .. } => "chunk_deleted",
            MemoryEvent::ChunkMigrated { .. } => "chunk_migrated",
            MemoryEvent::TransactionCommitted { .. } => "transaction_committed",
            MemoryEvent::TransactionRolledBack { .. } => "transaction_rolled_back",
            MemoryEvent::AlertRaised { .. } => "alert_raised",
        }
    }
}
