// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-process storage provider
//!
//! Keeps objects in a map with a fixed byte capacity. Starts connected.
//! Failure switches let tests simulate a backend that rejects writes or
//! cannot report its quota.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use crate::domain::storage::{
    ObjectMetadata, StorageError, StorageLocation, StorageProvider, StorageQuota, StorageTier,
};

pub struct InMemoryStorageProvider {
    id: String,
    name: String,
    tier: StorageTier,
    capacity_bytes: u64,
    connected: AtomicBool,
    fail_stores: AtomicBool,
    fail_quota: AtomicBool,
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryStorageProvider {
    pub fn new(id: impl Into<String>, capacity_bytes: u64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            tier: StorageTier::Memory,
            capacity_bytes,
            connected: AtomicBool::new(true),
            fail_stores: AtomicBool::new(false),
            fail_quota: AtomicBool::new(false),
            objects: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Report a different tier (lets tests stand in for remote backends)
    pub fn with_tier(mut self, tier: StorageTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn set_fail_stores(&self, fail: bool) {
        self.fail_stores.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_quota(&self, fail: bool) {
        self.fail_quota.store(fail, Ordering::SeqCst);
    }

    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }

    fn used_bytes(&self) -> u64 {
        self.objects.read().values().map(|v| v.len() as u64).sum()
    }

    fn ensure_connected(&self) -> Result<(), StorageError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(StorageError::NotConnected(self.id.clone()))
        }
    }
}

#[async_trait]
impl StorageProvider for InMemoryStorageProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn tier(&self) -> StorageTier {
        self.tier
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<(), StorageError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), StorageError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn store(&self, data: &[u8], metadata: &ObjectMetadata) -> Result<StorageLocation, StorageError> {
        self.ensure_connected()?;
        if self.fail_stores.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!("{} rejected the write", self.id)));
        }

        let mut objects = self.objects.write();
        let key = metadata.object_id.clone();
        let used: u64 = objects
            .iter()
            .filter(|(k, _)| **k != key)
            .map(|(_, v)| v.len() as u64)
            .sum();
        let available = self.capacity_bytes.saturating_sub(used);
        if data.len() as u64 > available {
            return Err(StorageError::QuotaExceeded {
                provider_id: self.id.clone(),
                requested_bytes: data.len() as u64,
                available_bytes: available,
            });
        }

        objects.insert(key.clone(), data.to_vec());
        debug!(provider_id = %self.id, key = %key, size_bytes = data.len(), "Stored object in memory");
        Ok(StorageLocation::new(self.id.clone(), key))
    }

    async fn retrieve(&self, location: &StorageLocation) -> Result<Vec<u8>, StorageError> {
        self.ensure_connected()?;
        self.objects
            .read()
            .get(&location.key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(location.key.clone()))
    }

    async fn exists(&self, location: &StorageLocation) -> Result<bool, StorageError> {
        self.ensure_connected()?;
        Ok(self.objects.read().contains_key(&location.key))
    }

    async fn delete(&self, location: &StorageLocation) -> Result<bool, StorageError> {
        self.ensure_connected()?;
        Ok(self.objects.write().remove(&location.key).is_some())
    }

    async fn get_quota(&self) -> Result<StorageQuota, StorageError> {
        if self.fail_quota.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!("{} quota service down", self.id)));
        }
        Ok(StorageQuota::new(self.used_bytes(), self.capacity_bytes))
    }
}
