// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer: event bus, embedder and storage backends

pub mod embedding_client;
pub mod event_bus;
pub mod storage;

pub use embedding_client::HashEmbedder;
pub use event_bus::{EventBus, EventBusError, EventReceiver};
pub use storage::{create_storage_provider, InMemoryStorageProvider, LocalStorageProvider, StorageBackend};
