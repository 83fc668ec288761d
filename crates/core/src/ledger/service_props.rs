//! Property-based tests for fund transfers.
//!
//! - Conservation: a transfer never changes the combined balance
//! - No overdraft: a failed transfer leaves both accounts untouched
//! - Correlation: reported rows always span more than one account

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use coffer_shared::types::{AccountId, TransactionLogId, UserId};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::correlation::find_common_transactions;
use super::error::LedgerError;
use super::service::LedgerService;
use super::transfer::apply_transfer;
use super::types::{Account, TransactionLog};
use crate::clock::FixedClock;
use crate::store::MemoryStore;

/// Strategy to generate balances (0.00 to 10,000.00).
fn balance() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate positive amounts (0.01 to 10,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn make_account(id: i64, balance: Decimal) -> Account {
    let opened = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let mut account = Account::new(UserId::new(1), "Checking", format!("CHK-{id}"), balance, opened);
    account.id = AccountId::new(id);
    account
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// *For any* balances and amount, the combined balance is unchanged and
    /// the source never goes negative.
    #[test]
    fn prop_apply_transfer_conserves_money(
        from_balance in balance(),
        to_balance in balance(),
        amount in positive_amount(),
    ) {
        let mut source = make_account(1, from_balance);
        let mut destination = make_account(2, to_balance);

        match apply_transfer(&mut source, &mut destination, amount, Utc::now()) {
            Ok(log) => {
                prop_assert!(from_balance >= amount);
                prop_assert_eq!(log.amount, amount);
                prop_assert_eq!(source.current_balance, from_balance - amount);
            }
            Err(LedgerError::InsufficientFunds { .. }) => {
                prop_assert!(from_balance < amount);
                prop_assert_eq!(source.current_balance, from_balance);
                prop_assert_eq!(destination.current_balance, to_balance);
            }
            Err(other) => prop_assert!(false, "unexpected error: {other}"),
        }

        prop_assert!(source.current_balance >= Decimal::ZERO);
        prop_assert_eq!(
            source.current_balance + destination.current_balance,
            from_balance + to_balance
        );
    }

    /// *For any* sequence of transfers through the service, the total held
    /// across both accounts stays constant and exactly one log is written per
    /// successful transfer.
    #[test]
    fn prop_service_transfers_conserve_money(
        from_balance in balance(),
        to_balance in balance(),
        amounts in prop::collection::vec((positive_amount(), any::<bool>()), 1..8),
    ) {
        let rt = runtime();
        rt.block_on(async {
            let store = MemoryStore::new();
            let x = store.insert_account(make_account(0, from_balance)).await.unwrap();
            let y = store.insert_account(make_account(0, to_balance)).await.unwrap();
            let ledger = LedgerService::with_clock(store.clone(), Arc::new(FixedClock(Utc::now())));

            let mut succeeded = 0;
            for (amount, forward) in amounts {
                let (from, to) = if forward { (x.id, y.id) } else { (y.id, x.id) };
                if ledger.transfer_funds(from, to, amount).await.unwrap() {
                    succeeded += 1;
                }
            }

            let x_after = store.account(x.id).await.unwrap().current_balance;
            let y_after = store.account(y.id).await.unwrap().current_balance;
            prop_assert_eq!(x_after + y_after, from_balance + to_balance);
            prop_assert!(x_after >= Decimal::ZERO);
            prop_assert!(y_after >= Decimal::ZERO);
            prop_assert_eq!(store.transaction_logs().await.len(), succeeded);
            Ok(())
        })?;
    }

    /// *For any* set of rows, every reported row carries at least two
    /// distinct accounts, one of which is its own.
    #[test]
    fn prop_correlated_rows_span_accounts(
        rows in prop::collection::vec((1i64..5, 1i64..4, prop::bool::ANY), 0..30),
    ) {
        let logs: Vec<TransactionLog> = rows
            .iter()
            .enumerate()
            .map(|(index, (account, cents, is_deposit))| TransactionLog {
                id: TransactionLogId::new(i64::try_from(index).unwrap() + 1),
                account_id: AccountId::new(*account),
                transaction_type: (if *is_deposit { "Deposit" } else { "Withdrawal" }).to_string(),
                amount: Decimal::new(*cents * 100, 2),
                status: "Completed".to_string(),
                timestamp: Utc::now(),
                details: String::new(),
            })
            .collect();

        let correlated = find_common_transactions(&logs);

        for entry in &correlated {
            prop_assert!(entry.account_ids.len() >= 2);
            let own = logs
                .iter()
                .find(|log| log.id == entry.transaction_id)
                .unwrap();
            prop_assert!(entry.account_ids.contains(&own.account_id));
        }
        let mut ids: Vec<_> = correlated.iter().map(|c| c.transaction_id).collect();
        ids.dedup();
        prop_assert_eq!(ids.len(), correlated.len());
    }
}
