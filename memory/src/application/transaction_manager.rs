// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # TransactionManager - ordered execution with compensation
//!
//! Runs the operations of a transaction strictly one after another. When
//! operation `i` fails, the compensations of operations `i-1 .. 0` run in
//! exactly that reverse order. A failing compensation is recorded as a
//! warning and the remaining compensations still run; the outcome is
//! `RolledBack` carrying the original error either way.
//!
//! Operations never run concurrently and transactions do not nest.

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::domain::events::MemoryEvent;
use crate::domain::transaction::{
    TransactionId, TransactionOperation, TransactionResult, TransactionStatus,
};
use crate::infrastructure::event_bus::EventBus;

#[derive(Clone, Default)]
pub struct TransactionManager {
    event_bus: Option<EventBus>,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self { event_bus: None }
    }

    pub fn with_event_bus(event_bus: EventBus) -> Self {
        Self {
            event_bus: Some(event_bus),
        }
    }

    pub async fn execute_transaction(&self, operations: Vec<TransactionOperation>) -> TransactionResult {
        let transaction_id = TransactionId::new();
        let mut results = Vec::with_capacity(operations.len());

        debug!(%transaction_id, operations = operations.len(), "Starting transaction");

        for (index, operation) in operations.iter().enumerate() {
            match operation.step().execute().await {
                Ok(value) => {
                    debug!(%transaction_id, step = index, operation_id = %operation.id, description = %operation.description, "Transaction step succeeded");
                    results.push(value);
                }
                Err(err) => {
                    error!(
                        %transaction_id,
                        step = index,
                        operation_id = %operation.id,
                        description = %operation.description,
                        error = %err,
                        "Transaction step failed, rolling back"
                    );

                    let compensation_warnings =
                        Self::compensate(transaction_id, &operations[..index]).await;

                    self.publish(MemoryEvent::TransactionRolledBack {
                        transaction_id,
                        failed_step: index,
                        error: err.to_string(),
                        compensation_warnings: compensation_warnings.clone(),
                        timestamp: Utc::now(),
                    });

                    return TransactionResult {
                        transaction_id,
                        status: TransactionStatus::RolledBack,
                        results,
                        error: Some(err),
                        failed_step: Some(index),
                        compensation_warnings,
                    };
                }
            }
        }

        info!(%transaction_id, operations = operations.len(), "Transaction committed");
        self.publish(MemoryEvent::TransactionCommitted {
            transaction_id,
            operations: operations.len(),
            timestamp: Utc::now(),
        });

        TransactionResult {
            transaction_id,
            status: TransactionStatus::Committed,
            results,
            error: None,
            failed_step: None,
            compensation_warnings: Vec::new(),
        }
    }

    /// Undo `completed` newest first, collecting failures as warnings
    async fn compensate(transaction_id: TransactionId, completed: &[TransactionOperation]) -> Vec<String> {
        let mut warnings = Vec::new();

        for (index, operation) in completed.iter().enumerate().rev() {
            match operation.step().compensate().await {
                Ok(()) => {
                    debug!(%transaction_id, step = index, operation_id = %operation.id, description = %operation.description, "Compensated transaction step");
                }
                Err(err) => {
                    warn!(
                        %transaction_id,
                        step = index,
                        operation_id = %operation.id,
                        description = %operation.description,
                        error = %err,
                        "Compensation failed"
                    );
                    warnings.push(format!(
                        "compensation of step {} ({}, operation {}) failed: {}",
                        index, operation.description, operation.id, err
                    ));
                }
            }
        }

        warnings
    }

    fn publish(&self, event: MemoryEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}
