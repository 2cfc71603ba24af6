// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Local Filesystem Storage Provider
//!
//! Stores each object as one file under a base directory. Intended for
//! single-node deployments and testing.
//!
//! **Limitations:**
//! - Capacity is a configured budget, not a filesystem quota; usage is the
//!   sum of stored file sizes
//! - No replication
//! - Keys are flat file names; anything that looks like a path is rejected

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use crate::domain::storage::{
    ObjectMetadata, StorageError, StorageLocation, StorageProvider, StorageQuota, StorageTier,
};

const OBJECT_EXTENSION: &str = "json";

pub struct LocalStorageProvider {
    id: String,
    name: String,
    /// Directory holding one file per object
    base_path: PathBuf,
    capacity_bytes: u64,
    connected: AtomicBool,
}

impl LocalStorageProvider {
    /// Create a provider rooted at `base_path`
    ///
    /// Nothing touches the filesystem until [`StorageProvider::connect`].
    pub fn new(id: impl Into<String>, base_path: impl Into<PathBuf>, capacity_bytes: u64) -> Self {
        let id = id.into();
        Self {
            name: format!("Local filesystem ({})", id),
            id,
            base_path: base_path.into(),
            capacity_bytes,
            connected: AtomicBool::new(false),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn object_key(object_id: &str) -> Result<String, StorageError> {
        Self::validate_key(object_id)?;
        Ok(format!("{}.{}", object_id, OBJECT_EXTENSION))
    }

    fn validate_key(key: &str) -> Result<(), StorageError> {
        if key.is_empty()
            || key.contains('/')
            || key.contains('\\')
            || key.contains("..")
            || key.starts_with('.')
        {
            return Err(StorageError::InvalidLocation(key.to_string()));
        }
        Ok(())
    }

    fn resolve(&self, location: &StorageLocation) -> Result<PathBuf, StorageError> {
        if location.provider_id != self.id {
            return Err(StorageError::InvalidLocation(format!(
                "location belongs to provider {}",
                location.provider_id
            )));
        }
        Self::validate_key(&location.key)?;
        Ok(self.base_path.join(&location.key))
    }

    fn ensure_connected(&self) -> Result<(), StorageError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(StorageError::NotConnected(self.id.clone()))
        }
    }

    /// Total size of stored objects, excluding `skip`
    fn used_bytes(&self, skip: Option<&Path>) -> Result<u64, StorageError> {
        let mut total = 0u64;
        if !self.base_path.is_dir() {
            return Ok(0);
        }
        for entry in std::fs::read_dir(&self.base_path)? {
            let entry = entry?;
            let path = entry.path();
            if skip == Some(path.as_path()) {
                continue;
            }
            let metadata = entry.metadata()?;
            if metadata.is_file() {
                total += metadata.len();
            }
        }
        Ok(total)
    }
}

#[async_trait]
impl StorageProvider for LocalStorageProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn tier(&self) -> StorageTier {
        StorageTier::Local
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.base_path).map_err(|e| {
            StorageError::IoError(format!(
                "Failed to create base directory {}: {}",
                self.base_path.display(),
                e
            ))
        })?;

        // Verify directory is writable
        let marker = self.base_path.join(".strata-write-check");
        std::fs::write(&marker, b"ok").map_err(|e| {
            StorageError::PermissionDenied(format!(
                "Base directory {} is not writable: {}",
                self.base_path.display(),
                e
            ))
        })?;
        std::fs::remove_file(&marker)?;

        self.connected.store(true, Ordering::SeqCst);
        info!(provider_id = %self.id, base_path = %self.base_path.display(), "Local storage provider connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), StorageError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn store(&self, data: &[u8], metadata: &ObjectMetadata) -> Result<StorageLocation, StorageError> {
        self.ensure_connected()?;

        let key = Self::object_key(&metadata.object_id)?;
        let path = self.base_path.join(&key);

        let used = self.used_bytes(Some(&path))?;
        let available = self.capacity_bytes.saturating_sub(used);
        if data.len() as u64 > available {
            return Err(StorageError::QuotaExceeded {
                provider_id: self.id.clone(),
                requested_bytes: data.len() as u64,
                available_bytes: available,
            });
        }

        std::fs::write(&path, data)
            .map_err(|e| StorageError::IoError(format!("Failed to write {}: {}", path.display(), e)))?;

        debug!(provider_id = %self.id, key = %key, size_bytes = data.len(), "Stored object on local filesystem");
        Ok(StorageLocation::new(self.id.clone(), key))
    }

    async fn retrieve(&self, location: &StorageLocation) -> Result<Vec<u8>, StorageError> {
        self.ensure_connected()?;
        let path = self.resolve(location)?;

        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(location.key.clone()),
            _ => StorageError::IoError(format!("Failed to read {}: {}", path.display(), e)),
        })
    }

    async fn exists(&self, location: &StorageLocation) -> Result<bool, StorageError> {
        self.ensure_connected()?;
        Ok(self.resolve(location)?.is_file())
    }

    async fn delete(&self, location: &StorageLocation) -> Result<bool, StorageError> {
        self.ensure_connected()?;
        let path = self.resolve(location)?;

        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::IoError(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn get_quota(&self) -> Result<StorageQuota, StorageError> {
        Ok(StorageQuota::new(self.used_bytes(None)?, self.capacity_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn metadata(object_id: &str) -> ObjectMetadata {
        ObjectMetadata {
            object_id: object_id.to_string(),
            domain: "default".to_string(),
            content_type: "application/json".to_string(),
        }
    }

    async fn connected_provider(temp_dir: &TempDir, capacity: u64) -> LocalStorageProvider {
        let provider = LocalStorageProvider::new("local", temp_dir.path().join("objects"), capacity);
        provider.connect().await.unwrap();
        provider
    }

    #[tokio::test]
    async fn test_requires_connect() {
        let temp_dir = TempDir::new().unwrap();
        let provider = LocalStorageProvider::new("local", temp_dir.path().join("objects"), 1024);

        assert!(!provider.is_connected());
        assert!(matches!(
            provider.store(b"{}", &metadata("a")).await,
            Err(StorageError::NotConnected(_))
        ));

        provider.connect().await.unwrap();
        assert!(provider.is_connected());
        assert!(provider.base_path().is_dir());
    }

    #[tokio::test]
    async fn test_store_retrieve_delete() {
        let temp_dir = TempDir::new().unwrap();
        let provider = connected_provider(&temp_dir, 1024).await;

        let location = provider.store(b"{\"a\":1}", &metadata("chunk-1")).await.unwrap();
        assert_eq!(location.key, "chunk-1.json");
        assert!(temp_dir.path().join("objects").join("chunk-1.json").is_file());

        assert!(provider.exists(&location).await.unwrap());
        assert_eq!(provider.retrieve(&location).await.unwrap(), b"{\"a\":1}");

        let quota = provider.get_quota().await.unwrap();
        assert_eq!(quota.used, 7);
        assert_eq!(quota.available, 1024 - 7);

        assert!(provider.delete(&location).await.unwrap());
        assert!(!provider.delete(&location).await.unwrap());
        assert!(matches!(provider.retrieve(&location).await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_capacity_budget() {
        let temp_dir = TempDir::new().unwrap();
        let provider = connected_provider(&temp_dir, 10).await;

        provider.store(b"123456", &metadata("a")).await.unwrap();
        let result = provider.store(b"123456", &metadata("b")).await;

        assert!(matches!(result, Err(StorageError::QuotaExceeded { available_bytes: 4, .. })));
    }

    #[tokio::test]
    async fn test_rejects_path_like_keys() {
        let temp_dir = TempDir::new().unwrap();
        let provider = connected_provider(&temp_dir, 1024).await;

        assert!(matches!(
            provider.store(b"x", &metadata("../escape")).await,
            Err(StorageError::InvalidLocation(_))
        ));
        assert!(matches!(
            provider.retrieve(&StorageLocation::new("local", "nested/key.json")).await,
            Err(StorageError::InvalidLocation(_))
        ));
        assert!(matches!(
            provider.retrieve(&StorageLocation::new("other", "a.json")).await,
            Err(StorageError::InvalidLocation(_))
        ));
    }
}
