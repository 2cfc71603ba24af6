// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Compensating transactions
//!
//! A transaction is an ordered list of operations. Each operation pairs an
//! `execute` step with a `compensate` step that undoes it. Compensations must
//! be idempotent and safe to call even when `execute` failed half-way.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::error::{MemoryError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(pub Uuid);

impl OperationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A side-effecting step and its undo
#[async_trait]
pub trait TransactionStep: Send + Sync {
    async fn execute(&self) -> Result<Value>;

    async fn compensate(&self) -> Result<()>;
}

pub struct TransactionOperation {
    pub id: OperationId,
    pub description: String,
    step: Box<dyn TransactionStep>,
}

impl TransactionOperation {
    pub fn new(description: impl Into<String>, step: impl TransactionStep + 'static) -> Self {
        Self {
            id: OperationId::new(),
            description: description.into(),
            step: Box::new(step),
        }
    }

    pub(crate) fn step(&self) -> &dyn TransactionStep {
        self.step.as_ref()
    }
}

impl fmt::Debug for TransactionOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionOperation")
            .field("id", &self.id)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Committed,
    RolledBack,
}

#[derive(Debug)]
pub struct TransactionResult {
    pub transaction_id: TransactionId,
    pub status: TransactionStatus,
    /// Outputs of the steps that executed successfully, in order
    pub results: Vec<Value>,
    /// The failure that triggered rollback
    pub error: Option<MemoryError>,
    /// Index of the failed operation
    pub failed_step: Option<usize>,
    /// Compensation failures; never change `status`
    pub compensation_warnings: Vec<String>,
}

impl TransactionResult {
    pub fn is_committed(&self) -> bool {
        self.status == TransactionStatus::Committed
    }

    /// Committed results, or the triggering error wrapped with any
    /// compensation warnings
    pub fn into_result(self) -> Result<Vec<Value>> {
        match (self.status, self.error) {
            (TransactionStatus::Committed, _) => Ok(self.results),
            (TransactionStatus::RolledBack, Some(error)) => Err(MemoryError::Transaction {
                source: Box::new(error),
                compensation_warnings: self.compensation_warnings,
            }),
            (TransactionStatus::RolledBack, None) => Err(MemoryError::Transaction {
                source: Box::new(MemoryError::Operation("transaction rolled back".to_string())),
                compensation_warnings: self.compensation_warnings,
            }),
        }
    }
}
