//! Ledger domain types.
//!
//! Accounts and transaction logs are the two persisted entities. Transaction
//! types and statuses are free-form strings in storage; the well-known values
//! live in [`transaction_types`] and [`transaction_statuses`].

use chrono::{DateTime, Utc};
use coffer_shared::types::{AccountId, TransactionLogId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::store::Entity;

/// Well-known transaction type strings.
pub mod transaction_types {
    /// Money entering an account from outside the ledger.
    pub const DEPOSIT: &str = "Deposit";
    /// Money leaving an account to outside the ledger.
    pub const WITHDRAWAL: &str = "Withdrawal";
    /// Money moved between two ledger accounts.
    pub const TRANSFER: &str = "Transfer";
}

/// Well-known transaction status strings.
pub mod transaction_statuses {
    /// Recorded but not yet settled.
    pub const PENDING: &str = "Pending";
    /// Settled.
    pub const COMPLETED: &str = "Completed";
    /// Attempted and abandoned.
    pub const FAILED: &str = "Failed";
}

/// A bank account as held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Store-assigned identity.
    pub id: AccountId,
    /// Owning user.
    pub user_id: UserId,
    /// Free-form category (e.g. "Checking", "Savings").
    pub account_type: String,
    /// Display identifier.
    pub account_number: String,
    /// Authoritative balance. Never recomputed from transaction logs.
    pub current_balance: Decimal,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped by the store on every update.
    pub version: i64,
}

impl Account {
    /// Builds an account that has not been persisted yet.
    #[must_use]
    pub fn new(
        user_id: UserId,
        account_type: impl Into<String>,
        account_number: impl Into<String>,
        opening_balance: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AccountId::UNASSIGNED,
            user_id,
            account_type: account_type.into(),
            account_number: account_number.into(),
            current_balance: opening_balance,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }
}

impl Entity for Account {
    type Id = AccountId;

    const NAME: &'static str = "account";

    fn id(&self) -> AccountId {
        self.id
    }
}

/// A persisted record of money movement on one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionLog {
    /// Store-assigned identity.
    pub id: TransactionLogId,
    /// Account the movement belongs to.
    pub account_id: AccountId,
    /// Free-form type, see [`transaction_types`].
    pub transaction_type: String,
    /// Amount moved, at most two decimal places.
    pub amount: Decimal,
    /// Free-form status, see [`transaction_statuses`].
    pub status: String,
    /// Creation time, assigned by the writer.
    pub timestamp: DateTime<Utc>,
    /// Human-readable description.
    pub details: String,
}

impl Entity for TransactionLog {
    type Id = TransactionLogId;

    const NAME: &'static str = "transaction_log";

    fn id(&self) -> TransactionLogId {
        self.id
    }
}

/// Caller input for recording a transaction log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransactionLog {
    /// Account the movement belongs to.
    pub account_id: AccountId,
    /// Free-form type, see [`transaction_types`].
    pub transaction_type: String,
    /// Amount moved, at most two decimal places.
    pub amount: Decimal,
    /// Free-form status, see [`transaction_statuses`].
    pub status: String,
    /// Human-readable description.
    #[serde(default)]
    pub details: String,
    /// Ignored: the writer always stamps its own time.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewTransactionLog {
    /// Turns the input into an unsaved log stamped at `now`.
    ///
    /// Any caller-supplied timestamp is dropped here.
    #[must_use]
    pub fn into_log(self, now: DateTime<Utc>) -> TransactionLog {
        TransactionLog {
            id: TransactionLogId::UNASSIGNED,
            account_id: self.account_id,
            transaction_type: self.transaction_type,
            amount: self.amount,
            status: self.status,
            timestamp: now,
            details: self.details,
        }
    }
}

/// Outcome of a successful transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    /// Debited account.
    pub from_account_id: AccountId,
    /// Credited account.
    pub to_account_id: AccountId,
    /// Amount moved.
    pub amount: Decimal,
    /// Source balance after the transfer.
    pub from_balance: Decimal,
    /// Destination balance after the transfer.
    pub to_balance: Decimal,
    /// The "Transfer" log written for the source account.
    pub log: TransactionLog,
}

/// A transaction log whose amount and type recur on other queried accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelatedTransaction {
    /// The log row.
    pub transaction_id: TransactionLogId,
    /// Every distinct account carrying the same amount and type, ascending.
    pub account_ids: Vec<AccountId>,
    /// Shared transaction type.
    pub transaction_type: String,
    /// Shared amount.
    pub amount: Decimal,
    /// Time of this particular row.
    pub timestamp: DateTime<Utc>,
}

/// Per-account line of a [`BalanceSummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    /// The account.
    pub account_id: AccountId,
    /// Display identifier.
    pub account_number: String,
    /// Free-form category.
    pub account_type: String,
    /// Sum of completed deposits.
    pub total_deposits: Decimal,
    /// Sum of completed withdrawals.
    pub total_withdrawals: Decimal,
    /// Stored balance, reported as-is.
    pub current_balance: Decimal,
}

/// Totals across every account of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSummary {
    /// The user.
    pub user_id: UserId,
    /// Number of accounts owned.
    pub total_accounts: usize,
    /// Sum of per-account deposits.
    pub total_deposits: Decimal,
    /// Sum of per-account withdrawals.
    pub total_withdrawals: Decimal,
    /// Sum of stored balances.
    pub total_balance: Decimal,
    /// Per-account lines, ordered by account id.
    pub accounts: Vec<AccountSummary>,
}

impl BalanceSummary {
    /// Summary for a user without accounts.
    #[must_use]
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            total_accounts: 0,
            total_deposits: Decimal::ZERO,
            total_withdrawals: Decimal::ZERO,
            total_balance: Decimal::ZERO,
            accounts: Vec::new(),
        }
    }
}
