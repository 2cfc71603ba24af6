// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Strata Memory
//!
//! Hierarchical content memory. Chunks of content are embedded, organized
//! into domain-scoped buckets for similarity search and placed into tiered
//! storage providers with failover.
//!
//! # Architecture
//!
//! - **domain:** chunks, buckets, the vector index, storage and alert types
//! - **application:** [`MemoryManager`], [`TransactionManager`], [`ResourceMonitor`]
//! - **infrastructure:** event bus, storage providers, a deterministic embedder
//!
//! Embedding and summarization are external services reached through the
//! [`Embedder`] and [`Summarizer`] traits.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use application::*;
pub use config::{MemoryConfig, MonitorConfig};
pub use domain::*;
pub use error::{ErrorKind, MemoryError, Result};
