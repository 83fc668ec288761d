//! Ledger error types.
//!
//! Validation, lookup and business-rule failures live in [`LedgerError`].
//! Store failures are wrapped as [`PersistenceError`]. Event-sink failures
//! have their own type in [`crate::events::PublishError`] and never reach
//! this enum.

use coffer_shared::{AppError, types::AccountId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised by the persistent store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    /// Store I/O or transaction failure.
    #[error("Store failure: {0}")]
    Store(String),

    /// A versioned write found the row changed or gone.
    #[error("Concurrent modification of {entity} {id}")]
    Conflict {
        /// Entity name.
        entity: &'static str,
        /// Identity of the row, rendered.
        id: String,
    },

    /// The unit of work already committed or rolled back.
    #[error("Unit of work is already completed")]
    Completed,
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Malformed input, rejected before touching the store.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced account does not exist.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Source balance does not cover the requested amount.
    #[error("Insufficient funds in account {account_id}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Source account.
        account_id: AccountId,
        /// Balance at the time of the check.
        balance: Decimal,
        /// Requested amount.
        requested: Decimal,
    },

    /// A new balance would leave the supported money range.
    #[error("Balance of account {0} would exceed the supported range")]
    BalanceOutOfRange(AccountId),

    /// Store failure.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::BalanceOutOfRange(_) => "BALANCE_OUT_OF_RANGE",
            Self::Persistence(PersistenceError::Conflict { .. }) => "CONCURRENT_MODIFICATION",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }

    /// Returns true if repeating the operation could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(PersistenceError::Conflict { .. }))
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(msg) => Self::Validation(msg),
            LedgerError::AccountNotFound(id) => Self::NotFound(format!("account {id}")),
            err @ (LedgerError::InsufficientFunds { .. } | LedgerError::BalanceOutOfRange(_)) => {
                Self::BusinessRule(err.to_string())
            }
            LedgerError::Persistence(err @ PersistenceError::Conflict { .. }) => {
                Self::Conflict(err.to_string())
            }
            LedgerError::Persistence(err) => Self::Database(err.to_string()),
        }
    }
}
