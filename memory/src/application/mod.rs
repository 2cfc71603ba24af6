// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application layer: chunk lifecycle, transactions and monitoring

pub mod memory_manager;
pub mod resource_monitor;
pub mod transaction_manager;

pub use memory_manager::{BucketRelevance, MemoryManager, RelevanceQuery};
pub use resource_monitor::ResourceMonitor;
pub use transaction_manager::TransactionManager;
