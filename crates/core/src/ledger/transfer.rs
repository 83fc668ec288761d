//! The balance mutation at the heart of a fund transfer.

use chrono::{DateTime, Utc};
use coffer_shared::types::{AccountId, TransactionLogId};
use rust_decimal::Decimal;

use super::error::LedgerError;
use super::types::{Account, TransactionLog, transaction_statuses, transaction_types};
use super::validation::MAX_AMOUNT;

/// Human-readable description stored on the transfer log.
#[must_use]
pub fn transfer_details(from: AccountId, to: AccountId, amount: Decimal) -> String {
    format!("Transferred {amount} from account {from} to account {to}")
}

fn ensure_funds(account: &Account, amount: Decimal) -> Result<(), LedgerError> {
    if account.current_balance < amount {
        return Err(LedgerError::InsufficientFunds {
            account_id: account.id,
            balance: account.current_balance,
            requested: amount,
        });
    }
    Ok(())
}

fn in_range(balance: Option<Decimal>, account_id: AccountId) -> Result<Decimal, LedgerError> {
    balance
        .filter(|balance| balance.abs() <= MAX_AMOUNT)
        .ok_or(LedgerError::BalanceOutOfRange(account_id))
}

fn transfer_log(
    from: AccountId,
    to: AccountId,
    amount: Decimal,
    now: DateTime<Utc>,
) -> TransactionLog {
    TransactionLog {
        id: TransactionLogId::UNASSIGNED,
        account_id: from,
        transaction_type: transaction_types::TRANSFER.to_string(),
        amount,
        status: transaction_statuses::COMPLETED.to_string(),
        timestamp: now,
        details: transfer_details(from, to, amount),
    }
}

/// Moves `amount` from `source` to `destination` and returns the unsaved
/// "Transfer" log for the source side.
///
/// Both accounts are left untouched when the move fails.
///
/// # Errors
///
/// Returns `InsufficientFunds` if the source balance is below `amount`, or
/// `BalanceOutOfRange` if either new balance would leave the money range.
pub fn apply_transfer(
    source: &mut Account,
    destination: &mut Account,
    amount: Decimal,
    now: DateTime<Utc>,
) -> Result<TransactionLog, LedgerError> {
    ensure_funds(source, amount)?;
    let debited = in_range(source.current_balance.checked_sub(amount), source.id)?;
    let credited = in_range(destination.current_balance.checked_add(amount), destination.id)?;

    source.current_balance = debited;
    source.updated_at = now;
    destination.current_balance = credited;
    destination.updated_at = now;

    Ok(transfer_log(source.id, destination.id, amount, now))
}

/// Transfer where source and destination are one account.
///
/// The funds check still applies. The balance nets to unchanged and only
/// `updated_at` moves.
///
/// # Errors
///
/// Returns `InsufficientFunds` if the balance is below `amount`.
pub fn apply_self_transfer(
    account: &mut Account,
    amount: Decimal,
    now: DateTime<Utc>,
) -> Result<TransactionLog, LedgerError> {
    ensure_funds(account, amount)?;
    account.updated_at = now;
    Ok(transfer_log(account.id, account.id, amount, now))
}
