// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer: chunks, buckets, vector search, storage and monitoring types

pub mod alert;
pub mod bucket;
pub mod chunk;
pub mod embedding;
pub mod events;
pub mod storage;
pub mod transaction;
pub mod vector_index;

pub use alert::*;
pub use bucket::*;
pub use chunk::*;
pub use embedding::*;
pub use events::*;
pub use storage::*;
pub use transaction::*;
pub use vector_index::*;
