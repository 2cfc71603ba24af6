// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Transactions composed from caller-defined steps against real storage
//! providers: all-or-nothing placement of a batch of objects.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use strata_memory::infrastructure::InMemoryStorageProvider;
use strata_memory::{
    ErrorKind, MemoryError, ObjectMetadata, StorageLocation, StorageProvider, TransactionManager,
    TransactionOperation, TransactionStatus, TransactionStep,
};

/// Store one object; compensation deletes whatever was written
struct PutObject {
    provider: Arc<InMemoryStorageProvider>,
    object_id: String,
    payload: Vec<u8>,
    written: Mutex<Option<StorageLocation>>,
}

impl PutObject {
    fn operation(provider: &Arc<InMemoryStorageProvider>, object_id: &str, payload: &[u8]) -> TransactionOperation {
        TransactionOperation::new(
            format!("put {}", object_id),
            PutObject {
                provider: provider.clone(),
                object_id: object_id.to_string(),
                payload: payload.to_vec(),
                written: Mutex::new(None),
            },
        )
    }
}

#[async_trait]
impl TransactionStep for PutObject {
    async fn execute(&self) -> strata_memory::Result<Value> {
        let metadata = ObjectMetadata {
            object_id: self.object_id.clone(),
            domain: "batch".to_string(),
            content_type: "application/octet-stream".to_string(),
        };
        let location = self.provider.store(&self.payload, &metadata).await?;
        *self.written.lock() = Some(location.clone());
        Ok(json!({ "key": location.key }))
    }

    async fn compensate(&self) -> strata_memory::Result<()> {
        let written = self.written.lock().take();
        if let Some(location) = written {
            self.provider.delete(&location).await?;
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_batch_commits_when_everything_fits() {
    let provider = Arc::new(InMemoryStorageProvider::new("mem", 64));
    let manager = TransactionManager::new();

    let result = manager
        .execute_transaction(vec![
            PutObject::operation(&provider, "a", b"0123456789"),
            PutObject::operation(&provider, "b", b"0123456789"),
        ])
        .await;

    assert_eq!(result.status, TransactionStatus::Committed);
    assert_eq!(result.results, vec![json!({ "key": "a" }), json!({ "key": "b" })]);
    assert_eq!(provider.object_count(), 2);
}

#[tokio::test]
async fn test_batch_rolls_back_on_quota() {
    let provider = Arc::new(InMemoryStorageProvider::new("mem", 24));
    let manager = TransactionManager::new();

    let result = manager
        .execute_transaction(vec![
            PutObject::operation(&provider, "a", b"0123456789"),
            PutObject::operation(&provider, "b", b"0123456789"),
            PutObject::operation(&provider, "c", b"0123456789"),
        ])
        .await;

    assert_eq!(result.status, TransactionStatus::RolledBack);
    assert_eq!(result.failed_step, Some(2));
    assert_eq!(result.results.len(), 2);
    assert!(result.compensation_warnings.is_empty());
    assert_eq!(provider.object_count(), 0);

    let err = result.into_result().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transaction);
    match err {
        MemoryError::Transaction { source, .. } => {
            assert!(matches!(*source, MemoryError::Storage(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_compensation_failure_is_reported_not_fatal() {
    let provider = Arc::new(InMemoryStorageProvider::new("mem", 1024));
    let manager = TransactionManager::new();

    let result = manager
        .execute_transaction(vec![
            PutObject::operation(&provider, "a", b"x"),
            TransactionOperation::new("go offline", Disconnect(provider.clone())),
            PutObject::operation(&provider, "b", b"y"),
        ])
        .await;

    // deleting "a" fails while the provider is offline
    assert_eq!(result.status, TransactionStatus::RolledBack);
    assert_eq!(result.compensation_warnings.len(), 1);
    assert!(result.compensation_warnings[0].contains("put a"));
    assert!(matches!(result.error, Some(MemoryError::Storage(_))));
}

struct Disconnect(Arc<InMemoryStorageProvider>);

#[async_trait]
impl TransactionStep for Disconnect {
    async fn execute(&self) -> strata_memory::Result<Value> {
        self.0.disconnect().await?;
        Ok(Value::Null)
    }

    async fn compensate(&self) -> strata_memory::Result<()> {
        // stays offline so the earlier compensation observes it
        Ok(())
    }
}
