//! Ledger consistency core.
//!
//! This module implements the money-moving logic:
//! - Fund transfers with atomic balance updates
//! - Common-transaction detection across accounts
//! - Per-user balance summaries
//! - The transaction log write gateway with best-effort events
//! - Input validation and error types

pub mod balance;
pub mod correlation;
pub mod error;
pub mod gateway;
pub mod service;
pub mod transfer;
pub mod types;
pub mod validation;

#[cfg(test)]
mod service_props;
#[cfg(test)]
mod tests;
#[cfg(test)]
mod validation_props;

pub use balance::summarize;
pub use correlation::find_common_transactions;
pub use error::{LedgerError, PersistenceError};
pub use gateway::{DEFAULT_ROUTING_KEY, TransactionLogGateway};
pub use service::LedgerService;
pub use transfer::{apply_self_transfer, apply_transfer, transfer_details};
pub use types::{
    Account, AccountSummary, BalanceSummary, CorrelatedTransaction, NewTransactionLog,
    TransactionLog, TransferReceipt, transaction_statuses, transaction_types,
};
pub use validation::{MAX_AMOUNT, ValidationError, has_cent_precision};
