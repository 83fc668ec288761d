//! Ledger service: fund transfer, common-transaction detection and balance
//! summary on top of the unit of work and repository contracts.

use std::sync::Arc;

use coffer_shared::types::{AccountId, UserId};
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use super::balance::summarize;
use super::correlation::find_common_transactions;
use super::error::{LedgerError, PersistenceError};
use super::transfer::{apply_self_transfer, apply_transfer};
use super::types::{BalanceSummary, CorrelatedTransaction, TransferReceipt};
use super::validation::{distinct_account_set, validate_transfer};
use crate::clock::{Clock, SystemClock};
use crate::store::{
    AccountRepository, Repository, Store, TransactionLogRepository, UnitOfWork,
};

/// Ledger operations over any [`Store`].
///
/// Every call opens its own unit of work; the service itself holds no
/// per-operation state and can be shared across tasks.
pub struct LedgerService<S: Store> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: Store> LedgerService<S> {
    /// Creates a service stamping writes with the wall clock.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Creates a service with an explicit clock.
    #[must_use]
    pub fn with_clock(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Moves `amount` from one account to another.
    ///
    /// Returns `Ok(true)` once committed. Missing accounts, insufficient
    /// funds and store failures roll back, are logged, and return
    /// `Ok(false)`; use [`Self::try_transfer_funds`] to get the cause.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Validation` for a non-positive, sub-cent or
    /// out-of-range amount. No store call is made.
    pub async fn transfer_funds(
        &self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Decimal,
    ) -> Result<bool, LedgerError> {
        match self
            .try_transfer_funds(from_account_id, to_account_id, amount)
            .await
        {
            Ok(_) => Ok(true),
            Err(err @ LedgerError::Validation(_)) => Err(err),
            Err(err) => {
                error!(
                    %from_account_id,
                    %to_account_id,
                    %amount,
                    error = %err,
                    "Failed to transfer funds"
                );
                Ok(false)
            }
        }
    }

    /// Moves `amount` from one account to another and reports the outcome.
    ///
    /// Both balance updates and the source-side "Transfer" log are committed
    /// together or not at all. Account writes are versioned, so a concurrent
    /// change to either account fails the transfer instead of overdrawing.
    /// A transfer to the same account leaves its balance unchanged but is
    /// still funds-checked and logged.
    ///
    /// # Errors
    ///
    /// - `Validation` before any store call
    /// - `AccountNotFound` if either account is missing
    /// - `InsufficientFunds` if the source balance is below `amount`
    /// - `BalanceOutOfRange` if a new balance would leave the money range
    /// - `Persistence` on store failure or a concurrent modification
    ///
    /// Everything after validation is rolled back before returning.
    pub async fn try_transfer_funds(
        &self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Decimal,
    ) -> Result<TransferReceipt, LedgerError> {
        validate_transfer(amount)?;

        let mut uow = UnitOfWork::new(self.store.open_session());
        match self
            .run_transfer(&mut uow, from_account_id, to_account_id, amount)
            .await
        {
            Ok(receipt) => {
                info!(
                    %from_account_id,
                    %to_account_id,
                    %amount,
                    transaction_log_id = %receipt.log.id,
                    "Funds transferred"
                );
                Ok(receipt)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(error = %rollback_err, "Failed to roll back transfer");
                }
                Err(err)
            }
        }
    }

    async fn run_transfer(
        &self,
        uow: &mut UnitOfWork<S::Session>,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Decimal,
    ) -> Result<TransferReceipt, LedgerError> {
        uow.begin_transaction().await?;

        let mut source = uow
            .accounts()
            .get_by_id(from_account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(from_account_id))?;

        let (log, from_balance, to_balance) = if from_account_id == to_account_id {
            let log = apply_self_transfer(&mut source, amount, self.clock.now())?;
            let balance = source.current_balance;
            uow.accounts_mut().update(source);
            (log, balance, balance)
        } else {
            let mut destination = uow
                .accounts()
                .get_by_id(to_account_id)
                .await?
                .ok_or(LedgerError::AccountNotFound(to_account_id))?;
            let log = apply_transfer(&mut source, &mut destination, amount, self.clock.now())?;
            let balances = (source.current_balance, destination.current_balance);
            uow.accounts_mut().update(source);
            uow.accounts_mut().update(destination);
            (log, balances.0, balances.1)
        };
        uow.transaction_logs_mut().add(log);
        uow.commit().await?;

        let log = uow.transaction_logs_mut().take_inserted().pop().ok_or_else(|| {
            PersistenceError::Store("store did not return the transfer log".to_string())
        })?;

        Ok(TransferReceipt {
            from_account_id,
            to_account_id,
            amount,
            from_balance,
            to_balance,
            log,
        })
    }

    /// Finds transaction logs whose amount and type recur on at least two of
    /// the given accounts.
    ///
    /// Duplicate ids are collapsed first. Output is ordered by timestamp,
    /// then transaction id.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if fewer than two distinct accounts are given,
    /// or `Persistence` if the read fails.
    pub async fn get_common_transactions(
        &self,
        account_ids: &[AccountId],
    ) -> Result<Vec<CorrelatedTransaction>, LedgerError> {
        let account_ids = distinct_account_set(account_ids)?;

        let uow = UnitOfWork::new(self.store.open_session());
        let logs = uow
            .transaction_logs()
            .find_by_accounts(&account_ids)
            .await
            .inspect_err(|err| error!(error = %err, "Failed to load transaction logs"))?;

        Ok(find_common_transactions(&logs))
    }

    /// Sums completed deposits and withdrawals per account of `user_id`,
    /// next to each account's stored balance.
    ///
    /// A user without accounts gets a zeroed summary.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if a read fails.
    pub async fn get_account_balance_summary(
        &self,
        user_id: UserId,
    ) -> Result<BalanceSummary, LedgerError> {
        let uow = UnitOfWork::new(self.store.open_session());
        let accounts = uow
            .accounts()
            .find_by_user(user_id)
            .await
            .inspect_err(|err| error!(%user_id, error = %err, "Failed to load accounts"))?;
        if accounts.is_empty() {
            return Ok(BalanceSummary::empty(user_id));
        }

        let account_ids: Vec<AccountId> = accounts.iter().map(|account| account.id).collect();
        let logs = uow
            .transaction_logs()
            .find_by_accounts(&account_ids)
            .await
            .inspect_err(|err| error!(%user_id, error = %err, "Failed to load transaction logs"))?;

        Ok(summarize(user_id, &accounts, &logs))
    }
}
