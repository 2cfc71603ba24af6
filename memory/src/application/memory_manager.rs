// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # MemoryManager - chunk lifecycle, placement and retrieval
//!
//! Composition root for the memory layer. Owns the bucket hierarchy, the
//! registered storage providers and the chunk → location map, and delegates
//! embedding and summarization to external services.
//!
//! ## Placement
//!
//! `store_chunk` walks providers with the preferred tier first and then by
//! ascending tier. Disconnected providers are skipped; the first connected
//! provider whose quota has room for the serialized chunk and whose `store`
//! call succeeds wins. A failing provider call is remembered and the next
//! candidate is tried. A chunk is never split across providers.
//!
//! ## Concurrency
//!
//! Internal maps sit behind short-lived locks that are never held across an
//! await. Callers are still expected to serialize mutating calls (for
//! example one coordinator per manager); concurrent searches are fine.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::transaction_manager::TransactionManager;
use crate::config::MemoryConfig;
use crate::domain::bucket::{BucketConfig, BucketId, BucketTree};
use crate::domain::chunk::{Chunk, ChunkId, ChunkMetadata, MetadataOverrides};
use crate::domain::embedding::{Embedder, Summarizer};
use crate::domain::events::MemoryEvent;
use crate::domain::storage::{ObjectMetadata, StorageLocation, StorageProvider, StorageTier};
use crate::domain::transaction::{TransactionOperation, TransactionResult, TransactionStep};
use crate::domain::vector_index::{descending_score, ScoredChunk};
use crate::error::{MemoryError, Result};
use crate::infrastructure::event_bus::EventBus;

const CHUNK_CONTENT_TYPE: &str = "application/json";

/// Query accepted by [`MemoryManager::find_relevant_buckets`]
#[derive(Debug, Clone)]
pub enum RelevanceQuery {
    /// Embedded with the configured embedder first
    Text(String),
    Vector(Vec<f32>),
}

/// A root bucket scored against a query
#[derive(Debug, Clone)]
pub struct BucketRelevance {
    pub bucket_id: BucketId,
    pub name: String,
    pub domain: String,
    /// Mean score of the sampled results
    pub score: f32,
    pub sampled: usize,
}

type LocationMap = Arc<RwLock<HashMap<ChunkId, StorageLocation>>>;

pub struct MemoryManager {
    config: MemoryConfig,
    embedder: Option<Arc<dyn Embedder>>,
    summarizer: Option<Arc<dyn Summarizer>>,
    buckets: Arc<RwLock<BucketTree>>,
    providers: RwLock<Vec<Arc<dyn StorageProvider>>>,
    locations: LocationMap,
    transactions: TransactionManager,
    event_bus: EventBus,
}

impl MemoryManager {
    pub fn new(config: MemoryConfig) -> Self {
        let event_bus = EventBus::with_default_capacity();
        Self {
            config,
            embedder: None,
            summarizer: None,
            buckets: Arc::new(RwLock::new(BucketTree::new())),
            providers: RwLock::new(Vec::new()),
            locations: Arc::new(RwLock::new(HashMap::new())),
            transactions: TransactionManager::with_event_bus(event_bus.clone()),
            event_bus,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Publish to a shared bus instead of the manager's own
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.transactions = TransactionManager::with_event_bus(event_bus.clone());
        self.event_bus = event_bus;
        self
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }

    /// Shared handle to the bucket hierarchy (used for monitor registration)
    pub fn buckets(&self) -> Arc<RwLock<BucketTree>> {
        self.buckets.clone()
    }

    // ------------------------------------------------------------------
    // Buckets
    // ------------------------------------------------------------------

    /// Create a root bucket with the configured dimension and metric
    pub fn create_bucket(&self, name: impl Into<String>, domain: impl Into<String>) -> BucketId {
        self.create_bucket_with(self.default_bucket_config(name, domain))
    }

    pub fn create_bucket_with(&self, config: BucketConfig) -> BucketId {
        let id = self.buckets.write().create_root(config);
        debug!(bucket_id = %id, "Created root bucket");
        id
    }

    pub fn add_sub_bucket(
        &self,
        parent: BucketId,
        name: impl Into<String>,
        domain: impl Into<String>,
    ) -> Result<BucketId> {
        let config = self.default_bucket_config(name, domain);
        self.buckets.write().add_sub_bucket(parent, config)
    }

    pub fn add_chunk_to_bucket(&self, bucket_id: BucketId, chunk: Chunk) -> Result<usize> {
        self.buckets.write().add_chunk(bucket_id, chunk)
    }

    pub fn add_chunks_to_bucket(&self, bucket_id: BucketId, chunks: Vec<Chunk>) -> Result<Vec<usize>> {
        self.buckets.write().add_chunks(bucket_id, chunks)
    }

    pub fn search_bucket(
        &self,
        bucket_id: BucketId,
        query: &[f32],
        k: usize,
        recursive: bool,
    ) -> Result<Vec<ScoredChunk>> {
        self.buckets.read().search(bucket_id, query, k, recursive)
    }

    pub fn summarize_bucket(&self, bucket_id: BucketId, max_chunks: usize) -> Result<String> {
        self.buckets.read().summarize(bucket_id, max_chunks)
    }

    fn default_bucket_config(&self, name: impl Into<String>, domain: impl Into<String>) -> BucketConfig {
        BucketConfig::new(name, domain, self.config.embedding_dimension)
            .with_metric(self.config.distance_metric)
    }

    // ------------------------------------------------------------------
    // Chunks
    // ------------------------------------------------------------------

    /// Embed (and optionally summarize) `content` into a new chunk
    ///
    /// Metadata starts from the configured defaults (domain, source, empty
    /// tags, current time) with `overrides` layered on top.
    pub async fn create_chunk(
        &self,
        content: &str,
        overrides: MetadataOverrides,
        summarize: bool,
    ) -> Result<Chunk> {
        let embedder = self.embedder.as_ref().ok_or(MemoryError::EmbeddingUnavailable)?;

        let metadata = ChunkMetadata::new(&self.config.default_domain, &self.config.default_source)
            .merged_with(overrides);
        if metadata.domain.trim().is_empty() {
            return Err(MemoryError::InvalidMetadata("domain must not be empty".to_string()));
        }

        let embedding = embedder.embed(content).await?;

        let summaries = if summarize {
            let summarizer = self.summarizer.as_ref().ok_or_else(|| {
                MemoryError::SummarizationFailed("no summarizer configured".to_string())
            })?;
            summarizer.summarize(content, self.config.summary_levels).await?
        } else {
            Vec::new()
        };

        let chunk = Chunk::new(content, embedding, metadata).with_summaries(summaries);

        self.event_bus.publish(MemoryEvent::ChunkCreated {
            chunk_id: chunk.id,
            domain: chunk.metadata.domain.clone(),
            summary_levels: chunk.summaries.len(),
            timestamp: Utc::now(),
        });

        Ok(chunk)
    }

    // ------------------------------------------------------------------
    // Providers
    // ------------------------------------------------------------------

    /// Register a provider, replacing any provider with the same id
    pub fn register_provider(&self, provider: Arc<dyn StorageProvider>) {
        let mut providers = self.providers.write();
        providers.retain(|p| p.id() != provider.id());
        info!(provider_id = provider.id(), tier = %provider.tier(), "Registered storage provider");
        providers.push(provider);
    }

    pub fn unregister_provider(&self, provider_id: &str) -> Option<Arc<dyn StorageProvider>> {
        let mut providers = self.providers.write();
        let position = providers.iter().position(|p| p.id() == provider_id)?;
        Some(providers.remove(position))
    }

    /// Registered providers in registration order
    pub fn providers(&self) -> Vec<Arc<dyn StorageProvider>> {
        self.providers.read().clone()
    }

    pub fn provider(&self, provider_id: &str) -> Option<Arc<dyn StorageProvider>> {
        self.providers.read().iter().find(|p| p.id() == provider_id).cloned()
    }

    /// Connect every registered provider, returning how many are connected
    pub async fn connect_all(&self) -> usize {
        let mut connected = 0;
        for provider in self.providers() {
            if provider.is_connected() {
                connected += 1;
                continue;
            }
            match provider.connect().await {
                Ok(()) => connected += 1,
                Err(e) => warn!(provider_id = provider.id(), error = %e, "Failed to connect storage provider"),
            }
        }
        connected
    }

    /// Providers at `preferred` first, then by ascending tier
    fn placement_order(&self, preferred: Option<StorageTier>) -> Vec<Arc<dyn StorageProvider>> {
        let mut providers = self.providers();
        // stable: equal keys keep registration order
        providers.sort_by_key(|p| (Some(p.tier()) != preferred, p.tier()));
        providers
    }

    // ------------------------------------------------------------------
    // Placement
    // ------------------------------------------------------------------

    pub async fn store_chunk(&self, chunk: &Chunk, preferred_tier: Option<StorageTier>) -> Result<StorageLocation> {
        let bytes = chunk.to_bytes()?;
        let size = bytes.len() as u64;
        let metadata = object_metadata(chunk);

        let mut last_error: Option<MemoryError> = None;
        let mut saw_connected = false;

        for provider in self.placement_order(preferred_tier) {
            if !provider.is_connected() {
                debug!(provider_id = provider.id(), "Skipping disconnected provider");
                continue;
            }
            saw_connected = true;

            let quota = match provider.get_quota().await {
                Ok(quota) => quota,
                Err(e) => {
                    warn!(provider_id = provider.id(), error = %e, "Quota lookup failed, trying next provider");
                    last_error = Some(e.into());
                    continue;
                }
            };

            if quota.available < size {
                debug!(
                    provider_id = provider.id(),
                    available = quota.available,
                    required = size,
                    "Provider lacks capacity"
                );
                continue;
            }

            match provider.store(&bytes, &metadata).await {
                Ok(location) => {
                    self.locations.write().insert(chunk.id, location.clone());

                    info!(
                        chunk_id = %chunk.id,
                        provider_id = provider.id(),
                        tier = %provider.tier(),
                        size_bytes = size,
                        "Stored chunk"
                    );
                    self.event_bus.publish(MemoryEvent::ChunkStored {
                        chunk_id: chunk.id,
                        location: location.clone(),
                        tier: provider.tier(),
                        size_bytes: size,
                        timestamp: Utc::now(),
                    });

                    return Ok(location);
                }
                Err(e) => {
                    warn!(provider_id = provider.id(), error = %e, "Store failed, trying next provider");
                    last_error = Some(e.into());
                }
            }
        }

        match last_error {
            Some(err) => Err(MemoryError::NoProviderAvailable {
                chunk_id: chunk.id,
                last_error: Some(Box::new(err)),
            }),
            None if saw_connected => Err(MemoryError::InsufficientCapacity {
                chunk_id: chunk.id,
                required_bytes: size,
            }),
            None => Err(MemoryError::NoProviderAvailable {
                chunk_id: chunk.id,
                last_error: None,
            }),
        }
    }

    pub async fn retrieve_chunk(&self, chunk_id: ChunkId) -> Result<Chunk> {
        let location = self.location_of(chunk_id).ok_or(MemoryError::LocationNotFound(chunk_id))?;
        let provider = self
            .provider(&location.provider_id)
            .ok_or_else(|| MemoryError::ProviderNotFound(location.provider_id.clone()))?;

        let bytes = provider.retrieve(&location).await?;

        // The mapping stays: the stored bytes may still be fine
        Chunk::from_bytes(&bytes).map_err(|e| MemoryError::DeserializationFailed {
            chunk_id,
            reason: e.to_string(),
        })
    }

    /// Delete a stored chunk and forget its location
    ///
    /// Returns whether the provider actually removed an object.
    pub async fn delete_chunk(&self, chunk_id: ChunkId) -> Result<bool> {
        let location = self.location_of(chunk_id).ok_or(MemoryError::LocationNotFound(chunk_id))?;
        let provider = self
            .provider(&location.provider_id)
            .ok_or_else(|| MemoryError::ProviderNotFound(location.provider_id.clone()))?;

        let removed = provider.delete(&location).await?;
        self.locations.write().remove(&chunk_id);

        info!(chunk_id = %chunk_id, provider_id = %location.provider_id, removed, "Deleted chunk");
        self.event_bus.publish(MemoryEvent::ChunkDeleted {
            chunk_id,
            location,
            timestamp: Utc::now(),
        });

        Ok(removed)
    }

    pub fn location_of(&self, chunk_id: ChunkId) -> Option<StorageLocation> {
        self.locations.read().get(&chunk_id).cloned()
    }

    pub fn stored_chunk_count(&self) -> usize {
        self.locations.read().len()
    }

    /// Move a stored chunk to a provider at `target_tier`
    ///
    /// Runs as a transaction: copy to the target, repoint the location,
    /// delete the original. Any failure undoes the earlier steps.
    pub async fn migrate_chunk(&self, chunk_id: ChunkId, target_tier: StorageTier) -> Result<TransactionResult> {
        let source_location = self.location_of(chunk_id).ok_or(MemoryError::LocationNotFound(chunk_id))?;
        let source = self
            .provider(&source_location.provider_id)
            .ok_or_else(|| MemoryError::ProviderNotFound(source_location.provider_id.clone()))?;

        let bytes = source.retrieve(&source_location).await?;
        let chunk = Chunk::from_bytes(&bytes).map_err(|e| MemoryError::DeserializationFailed {
            chunk_id,
            reason: e.to_string(),
        })?;
        let target = self.migration_target(&chunk, source.id(), target_tier, bytes.len() as u64).await?;

        info!(
            chunk_id = %chunk_id,
            from = source.id(),
            to = target.id(),
            tier = %target_tier,
            "Migrating chunk"
        );

        let copied = Arc::new(Mutex::new(None));
        let operations = vec![
            TransactionOperation::new(
                format!("copy chunk {} to {}", chunk_id, target.id()),
                CopyToProvider {
                    target: target.clone(),
                    bytes,
                    metadata: object_metadata(&chunk),
                    copied: copied.clone(),
                },
            ),
            TransactionOperation::new(
                format!("repoint chunk {}", chunk_id),
                RepointLocation {
                    chunk_id,
                    locations: self.locations.clone(),
                    previous: source_location.clone(),
                    copied: copied.clone(),
                },
            ),
            TransactionOperation::new(
                format!("delete chunk {} from {}", chunk_id, source.id()),
                DeleteOriginal {
                    source,
                    location: source_location.clone(),
                },
            ),
        ];

        let result = self.transactions.execute_transaction(operations).await;

        let destination = copied.lock().clone();
        if result.is_committed() {
            if let Some(to) = destination {
                self.event_bus.publish(MemoryEvent::ChunkMigrated {
                    chunk_id,
                    from: source_location,
                    to,
                    timestamp: Utc::now(),
                });
            }
        }

        Ok(result)
    }

    async fn migration_target(
        &self,
        chunk: &Chunk,
        source_id: &str,
        tier: StorageTier,
        size: u64,
    ) -> Result<Arc<dyn StorageProvider>> {
        let candidates: Vec<_> = self
            .providers()
            .into_iter()
            .filter(|p| p.tier() == tier && p.id() != source_id && p.is_connected())
            .collect();

        if candidates.is_empty() {
            return Err(MemoryError::NoProviderAvailable {
                chunk_id: chunk.id,
                last_error: None,
            });
        }

        let mut last_error = None;
        for provider in candidates {
            match provider.get_quota().await {
                Ok(quota) if quota.available >= size => return Ok(provider),
                Ok(_) => {}
                Err(e) => last_error = Some(Box::new(MemoryError::from(e))),
            }
        }

        match last_error {
            Some(err) => Err(MemoryError::NoProviderAvailable {
                chunk_id: chunk.id,
                last_error: Some(err),
            }),
            None => Err(MemoryError::InsufficientCapacity {
                chunk_id: chunk.id,
                required_bytes: size,
            }),
        }
    }

    // ------------------------------------------------------------------
    // Relevance
    // ------------------------------------------------------------------

    /// Rank root buckets by the mean score of a small recursive sample
    ///
    /// Each root is searched for `relevance_sample_size` results; roots with
    /// no results are left out. This trades accuracy for speed: a sparsely
    /// populated bucket can outrank a large one.
    pub async fn find_relevant_buckets(&self, query: RelevanceQuery, k: usize) -> Result<Vec<BucketRelevance>> {
        let vector = match query {
            RelevanceQuery::Vector(vector) => vector,
            RelevanceQuery::Text(text) => {
                let embedder = self.embedder.as_ref().ok_or(MemoryError::EmbeddingUnavailable)?;
                embedder.embed(&text).await?
            }
        };

        let mut ranked = self.score_roots(&vector)?;
        ranked.sort_by(|a, b| descending_score(a.score, b.score));
        ranked.truncate(k);
        Ok(ranked)
    }

    fn score_roots(&self, vector: &[f32]) -> Result<Vec<BucketRelevance>> {
        let tree = self.buckets.read();
        let sample_size = self.config.relevance_sample_size;
        let mut scored = Vec::new();

        for root in tree.roots() {
            let sample = tree.search(*root, vector, sample_size, true)?;
            if sample.is_empty() {
                continue;
            }

            let mean = sample.iter().map(|hit| hit.score).sum::<f32>() / sample.len() as f32;
            let bucket = tree.get(*root)?;
            scored.push(BucketRelevance {
                bucket_id: *root,
                name: bucket.name.clone(),
                domain: bucket.domain.clone(),
                score: mean,
                sampled: sample.len(),
            });
        }

        Ok(scored)
    }
}

fn object_metadata(chunk: &Chunk) -> ObjectMetadata {
    ObjectMetadata {
        object_id: chunk.id.to_string(),
        domain: chunk.metadata.domain.clone(),
        content_type: CHUNK_CONTENT_TYPE.to_string(),
    }
}

// ============================================================================
// Migration steps
// ============================================================================

struct CopyToProvider {
    target: Arc<dyn StorageProvider>,
    bytes: Vec<u8>,
    metadata: ObjectMetadata,
    copied: Arc<Mutex<Option<StorageLocation>>>,
}

#[async_trait]
impl TransactionStep for CopyToProvider {
    async fn execute(&self) -> Result<Value> {
        let location = self.target.store(&self.bytes, &self.metadata).await?;
        *self.copied.lock() = Some(location.clone());
        Ok(serde_json::to_value(&location)?)
    }

    async fn compensate(&self) -> Result<()> {
        let copied = self.copied.lock().take();
        if let Some(location) = copied {
            self.target.delete(&location).await?;
        }
        Ok(())
    }
}

struct RepointLocation {
    chunk_id: ChunkId,
    locations: LocationMap,
    previous: StorageLocation,
    copied: Arc<Mutex<Option<StorageLocation>>>,
}

#[async_trait]
impl TransactionStep for RepointLocation {
    async fn execute(&self) -> Result<Value> {
        let location = self
            .copied
            .lock()
            .clone()
            .ok_or_else(|| MemoryError::Operation("no copied location to point at".to_string()))?;
        self.locations.write().insert(self.chunk_id, location.clone());
        Ok(serde_json::to_value(&location)?)
    }

    async fn compensate(&self) -> Result<()> {
        self.locations.write().insert(self.chunk_id, self.previous.clone());
        Ok(())
    }
}

struct DeleteOriginal {
    source: Arc<dyn StorageProvider>,
    location: StorageLocation,
}

#[async_trait]
impl TransactionStep for DeleteOriginal {
    async fn execute(&self) -> Result<Value> {
        let removed = self.source.delete(&self.location).await?;
        Ok(json!({ "removed": removed }))
    }

    async fn compensate(&self) -> Result<()> {
        // Final step: nothing after it can fail, so it is never undone
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chunk::ChunkSummary;
    use crate::domain::storage::StorageError;
    use crate::error::ErrorKind;
    use crate::infrastructure::storage::InMemoryStorageProvider;

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    struct EchoSummarizer;

    #[async_trait]
    impl Summarizer for EchoSummarizer {
        async fn summarize(&self, text: &str, levels: u32) -> Result<Vec<ChunkSummary>> {
            Ok((1..=levels)
                .map(|level| ChunkSummary {
                    level,
                    content: format!("L{}: {}", level, text),
                    concepts: vec![],
                })
                .collect())
        }
    }

    fn config() -> MemoryConfig {
        MemoryConfig {
            embedding_dimension: 3,
            ..MemoryConfig::default()
        }
    }

    fn manager() -> MemoryManager {
        MemoryManager::new(config()).with_embedder(Arc::new(FixedEmbedder(vec![1.0, 0.0, 0.0])))
    }

    fn sample_chunk() -> Chunk {
        Chunk::new("payload", vec![1.0, 0.0, 0.0], ChunkMetadata::new("default", "user"))
    }

    #[tokio::test]
    async fn test_create_chunk_requires_embedder() {
        let manager = MemoryManager::new(config());
        let err = manager
            .create_chunk("text", MetadataOverrides::default(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::EmbeddingUnavailable));
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn test_create_chunk_defaults_and_overrides() {
        let manager = manager().with_summarizer(Arc::new(EchoSummarizer));

        let chunk = manager
            .create_chunk("hello", MetadataOverrides::default().tags(vec!["greeting".to_string()]), true)
            .await
            .unwrap();

        assert_eq!(chunk.embedding, vec![1.0, 0.0, 0.0]);
        assert_eq!(chunk.metadata.domain, "default");
        assert_eq!(chunk.metadata.source, "user");
        assert_eq!(chunk.metadata.tags, vec!["greeting"]);
        assert_eq!(chunk.summaries.len(), 3);
        assert_eq!(chunk.summary_at(1).unwrap().content, "L1: hello");

        let plain = manager
            .create_chunk("hello", MetadataOverrides::default().domain("ops"), false)
            .await
            .unwrap();
        assert_eq!(plain.metadata.domain, "ops");
        assert!(plain.summaries.is_empty());
    }

    #[tokio::test]
    async fn test_create_chunk_rejects_empty_domain() {
        let err = manager()
            .create_chunk("x", MetadataOverrides::default().domain("  "), false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_store_prefers_tier_then_ascending() {
        let manager = manager();
        let cloud = Arc::new(InMemoryStorageProvider::new("cloud", 1 << 20).with_tier(StorageTier::Cloud));
        let local = Arc::new(InMemoryStorageProvider::new("local", 1 << 20).with_tier(StorageTier::Local));
        manager.register_provider(cloud.clone());
        manager.register_provider(local.clone());

        let chunk = sample_chunk();
        let location = manager.store_chunk(&chunk, Some(StorageTier::Cloud)).await.unwrap();
        assert_eq!(location.provider_id, "cloud");

        let other = sample_chunk();
        let location = manager.store_chunk(&other, None).await.unwrap();
        assert_eq!(location.provider_id, "local");
        assert_eq!(manager.stored_chunk_count(), 2);
    }

    #[tokio::test]
    async fn test_store_falls_back_after_failure() {
        let manager = manager();
        let flaky = Arc::new(InMemoryStorageProvider::new("flaky", 1 << 20));
        let backup = Arc::new(InMemoryStorageProvider::new("backup", 1 << 20).with_tier(StorageTier::Cloud));
        flaky.set_fail_stores(true);
        manager.register_provider(flaky);
        manager.register_provider(backup);

        let chunk = sample_chunk();
        let location = manager.store_chunk(&chunk, None).await.unwrap();

        assert_eq!(location.provider_id, "backup");
        assert_eq!(manager.location_of(chunk.id), Some(location));
    }

    #[tokio::test]
    async fn test_store_error_classification() {
        let manager = manager();
        let chunk = sample_chunk();

        // nothing registered
        let err = manager.store_chunk(&chunk, None).await.unwrap_err();
        assert!(matches!(err, MemoryError::NoProviderAvailable { last_error: None, .. }));

        // connected but too small
        manager.register_provider(Arc::new(InMemoryStorageProvider::new("tiny", 8)));
        let err = manager.store_chunk(&chunk, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capacity);

        // a failing call is carried along
        let broken = Arc::new(InMemoryStorageProvider::new("broken", 1 << 20));
        broken.set_fail_stores(true);
        manager.register_provider(broken);
        let err = manager.store_chunk(&chunk, None).await.unwrap_err();
        assert!(matches!(err, MemoryError::NoProviderAvailable { last_error: Some(_), .. }));

        assert!(manager.location_of(chunk.id).is_none());
    }

    #[tokio::test]
    async fn test_retrieve_round_trip_and_errors() {
        let manager = manager();
        let provider = Arc::new(InMemoryStorageProvider::new("mem", 1 << 20));
        manager.register_provider(provider.clone());

        let chunk = sample_chunk();
        assert!(matches!(
            manager.retrieve_chunk(chunk.id).await,
            Err(MemoryError::LocationNotFound(_))
        ));

        let location = manager.store_chunk(&chunk, None).await.unwrap();
        assert_eq!(manager.retrieve_chunk(chunk.id).await.unwrap(), chunk);

        // corrupt the stored bytes in place
        provider
            .store(b"not json", &object_metadata(&chunk))
            .await
            .unwrap();
        let err = manager.retrieve_chunk(chunk.id).await.unwrap_err();
        assert!(matches!(err, MemoryError::DeserializationFailed { .. }));
        assert_eq!(manager.location_of(chunk.id), Some(location));

        manager.unregister_provider("mem");
        assert!(matches!(
            manager.retrieve_chunk(chunk.id).await,
            Err(MemoryError::ProviderNotFound(id)) if id == "mem"
        ));
    }

    #[tokio::test]
    async fn test_delete_chunk_forgets_location() {
        let manager = manager();
        let provider = Arc::new(InMemoryStorageProvider::new("mem", 1 << 20));
        manager.register_provider(provider.clone());

        let chunk = sample_chunk();
        manager.store_chunk(&chunk, None).await.unwrap();

        assert!(manager.delete_chunk(chunk.id).await.unwrap());
        assert!(manager.location_of(chunk.id).is_none());
        assert_eq!(provider.object_count(), 0);
    }

    #[tokio::test]
    async fn test_migrate_chunk_moves_bytes() {
        let manager = manager();
        let hot = Arc::new(InMemoryStorageProvider::new("hot", 1 << 20));
        let cold = Arc::new(InMemoryStorageProvider::new("cold", 1 << 20).with_tier(StorageTier::Cloud));
        manager.register_provider(hot.clone());
        manager.register_provider(cold.clone());

        let chunk = sample_chunk();
        manager.store_chunk(&chunk, None).await.unwrap();

        let result = manager.migrate_chunk(chunk.id, StorageTier::Cloud).await.unwrap();

        assert!(result.is_committed());
        assert_eq!(result.results.len(), 3);
        assert_eq!(manager.location_of(chunk.id).unwrap().provider_id, "cold");
        assert_eq!(hot.object_count(), 0);
        assert_eq!(cold.object_count(), 1);
        assert_eq!(manager.retrieve_chunk(chunk.id).await.unwrap(), chunk);
    }

    #[tokio::test]
    async fn test_migration_requires_reachable_source() {
        let manager = manager();
        let hot = Arc::new(InMemoryStorageProvider::new("hot", 1 << 20));
        manager.register_provider(hot.clone());
        manager.register_provider(Arc::new(
            InMemoryStorageProvider::new("cold", 1 << 20).with_tier(StorageTier::Cloud),
        ));

        let chunk = sample_chunk();
        manager.store_chunk(&chunk, None).await.unwrap();
        hot.disconnect().await.unwrap();

        let err = manager.migrate_chunk(chunk.id, StorageTier::Cloud).await.unwrap_err();
        assert!(matches!(err, MemoryError::Storage(StorageError::NotConnected(_))));
    }

    #[tokio::test]
    async fn test_failed_migration_rolls_back() {
        let manager = manager();
        let hot = Arc::new(InMemoryStorageProvider::new("hot", 1 << 20));
        let cold = Arc::new(InMemoryStorageProvider::new("cold", 1 << 20).with_tier(StorageTier::Cloud));
        manager.register_provider(hot.clone());
        manager.register_provider(cold.clone());

        let chunk = sample_chunk();
        let original = manager.store_chunk(&chunk, None).await.unwrap();

        cold.set_fail_stores(true);
        let result = manager.migrate_chunk(chunk.id, StorageTier::Cloud).await.unwrap();

        assert!(!result.is_committed());
        assert_eq!(result.failed_step, Some(0));
        assert_eq!(manager.location_of(chunk.id), Some(original));
        assert_eq!(hot.object_count(), 1);
        assert_eq!(cold.object_count(), 0);
    }

    #[tokio::test]
    async fn test_migration_without_target_tier() {
        let manager = manager();
        manager.register_provider(Arc::new(InMemoryStorageProvider::new("hot", 1 << 20)));

        let chunk = sample_chunk();
        manager.store_chunk(&chunk, None).await.unwrap();

        let err = manager.migrate_chunk(chunk.id, StorageTier::Cloud).await.unwrap_err();
        assert!(matches!(err, MemoryError::NoProviderAvailable { last_error: None, .. }));
    }

    #[tokio::test]
    async fn test_find_relevant_buckets() {
        let manager = manager();
        let near = manager.create_bucket("near", "a");
        let far = manager.create_bucket("far", "b");
        let _empty = manager.create_bucket("empty", "c");
        let child = manager.add_sub_bucket(far, "far-child", "b").unwrap();

        manager.add_chunk_to_bucket(near, sample_chunk()).unwrap();
        manager
            .add_chunk_to_bucket(far, Chunk::new("f", vec![0.0, 1.0, 0.0], ChunkMetadata::new("x", "user")))
            .unwrap();
        manager
            .add_chunk_to_bucket(child, Chunk::new("c", vec![0.0, 0.0, 1.0], ChunkMetadata::new("x", "user")))
            .unwrap();

        let ranked = manager
            .find_relevant_buckets(RelevanceQuery::Text("anything".to_string()), 5)
            .await
            .unwrap();

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].bucket_id, near);
        assert!((ranked[0].score - 1.0).abs() < 1e-6);
        assert_eq!(ranked[1].bucket_id, far);
        assert_eq!(ranked[1].sampled, 2);

        let top = manager
            .find_relevant_buckets(RelevanceQuery::Vector(vec![0.0, 1.0, 0.0]), 1)
            .await
            .unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].bucket_id, far);
    }

    #[tokio::test]
    async fn test_text_relevance_requires_embedder() {
        let manager = MemoryManager::new(config());
        let err = manager
            .find_relevant_buckets(RelevanceQuery::Text("q".to_string()), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::EmbeddingUnavailable));
    }
}
