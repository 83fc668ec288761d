//! Input validation for ledger operations.
//!
//! Everything here runs before a unit of work is opened.

use coffer_shared::types::AccountId;
use rust_decimal::Decimal;
use thiserror::Error;

use super::error::LedgerError;
use super::types::NewTransactionLog;

/// Money is stored with at most this many decimal places.
pub const MONEY_SCALE: u32 = 2;

/// Largest amount or balance the ledger holds: 9999999999999999.99, the
/// `decimal(18, 2)` range.
pub const MAX_AMOUNT: Decimal =
    Decimal::from_parts(2_808_348_671, 232_830_643, 0, false, MONEY_SCALE);

/// Malformed ledger input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Amount is zero or negative.
    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    /// Amount has sub-cent digits.
    #[error("Amount {0} has more than two decimal places")]
    ExcessPrecision(Decimal),

    /// Amount magnitude is above [`MAX_AMOUNT`].
    #[error("Amount {0} exceeds the supported range")]
    AmountTooLarge(Decimal),

    /// Fewer distinct accounts than the operation needs.
    #[error("At least {required} distinct accounts are required, got {given}")]
    TooFewAccounts {
        /// Minimum distinct accounts.
        required: usize,
        /// Distinct accounts supplied.
        given: usize,
    },

    /// A required text field is blank.
    #[error("Field {0} must not be empty")]
    EmptyField(&'static str),
}

impl From<ValidationError> for LedgerError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Returns true if `amount` fits in cents without rounding.
#[must_use]
pub fn has_cent_precision(amount: Decimal) -> bool {
    amount.normalize().scale() <= MONEY_SCALE
}

/// Validates a transfer request.
///
/// # Errors
///
/// Returns an error if the amount is not positive, is above [`MAX_AMOUNT`],
/// or has sub-cent digits. Source and destination may be the same account.
pub fn validate_transfer(amount: Decimal) -> Result<(), ValidationError> {
    if amount <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveAmount(amount));
    }
    check_amount(amount)
}

fn check_amount(amount: Decimal) -> Result<(), ValidationError> {
    if amount.abs() > MAX_AMOUNT {
        return Err(ValidationError::AmountTooLarge(amount));
    }
    if !has_cent_precision(amount) {
        return Err(ValidationError::ExcessPrecision(amount));
    }
    Ok(())
}

/// Collapses duplicate account ids and requires at least two distinct ones.
///
/// The result is sorted ascending.
///
/// # Errors
///
/// Returns `TooFewAccounts` if fewer than two distinct ids remain.
pub fn distinct_account_set(account_ids: &[AccountId]) -> Result<Vec<AccountId>, ValidationError> {
    let mut distinct = account_ids.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() < 2 {
        return Err(ValidationError::TooFewAccounts {
            required: 2,
            given: distinct.len(),
        });
    }
    Ok(distinct)
}

/// Validates a transaction log before it is written.
///
/// Amount sign is not checked; logs record movements as the caller reports
/// them.
///
/// # Errors
///
/// Returns an error if type or status is blank or the amount has sub-cent
/// digits or is out of range.
pub fn validate_new_log(input: &NewTransactionLog) -> Result<(), ValidationError> {
    if input.transaction_type.trim().is_empty() {
        return Err(ValidationError::EmptyField("transaction_type"));
    }
    if input.status.trim().is_empty() {
        return Err(ValidationError::EmptyField("status"));
    }
    check_amount(input.amount)
}
