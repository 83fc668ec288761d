//! Event publisher contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coffer_shared::types::{AccountId, TransactionLogId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::TransactionLog;

/// A transaction log row became durable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionLoggedEvent {
    /// The persisted row.
    pub transaction_log_id: TransactionLogId,
    /// Account the row belongs to.
    pub account_id: AccountId,
    /// Transaction type.
    pub transaction_type: String,
    /// Amount moved.
    pub amount: Decimal,
    /// Status at write time.
    pub status: String,
    /// Server-assigned timestamp.
    pub timestamp: DateTime<Utc>,
    /// Human-readable description.
    pub details: String,
}

impl From<&TransactionLog> for TransactionLoggedEvent {
    fn from(log: &TransactionLog) -> Self {
        Self {
            transaction_log_id: log.id,
            account_id: log.account_id,
            transaction_type: log.transaction_type.clone(),
            amount: log.amount,
            status: log.status.clone(),
            timestamp: log.timestamp,
            details: log.details.clone(),
        }
    }
}

/// Event sink failures. Never fatal to the write that triggered them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// Nobody is listening.
    #[error("No subscribers for routing key {0}")]
    NoSubscribers(String),

    /// The sink rejected or lost the event.
    #[error("Event sink failure: {0}")]
    Sink(String),
}

/// Fire-and-forget notification sink.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes `event` under `routing_key`.
    ///
    /// # Errors
    ///
    /// Returns `PublishError` if the sink cannot take the event.
    async fn publish(
        &self,
        event: &TransactionLoggedEvent,
        routing_key: &str,
    ) -> Result<(), PublishError>;
}
