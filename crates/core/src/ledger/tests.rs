//! Ledger service and gateway tests against the in-memory store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use futures::future::join_all;
use coffer_shared::types::{AccountId, UserId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::*;
use crate::clock::FixedClock;
use crate::events::{BroadcastPublisher, EventPublisher, PublishError, TransactionLoggedEvent};
use crate::store::MemoryStore;

fn opened_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 14, 16, 30, 0).unwrap()
}

fn service(store: &MemoryStore) -> LedgerService<MemoryStore> {
    LedgerService::with_clock(store.clone(), Arc::new(FixedClock(now())))
}

fn gateway(store: &MemoryStore) -> TransactionLogGateway<MemoryStore> {
    TransactionLogGateway::new(store.clone()).with_clock(Arc::new(FixedClock(now())))
}

async fn seed_account(store: &MemoryStore, user: i64, balance: Decimal) -> Account {
    let account = Account::new(
        UserId::new(user),
        "Checking",
        format!("CHK-{user}"),
        balance,
        opened_at(),
    );
    store.insert_account(account).await.unwrap()
}

async fn seed_log(
    store: &MemoryStore,
    account: AccountId,
    kind: &str,
    status: &str,
    amount: Decimal,
    minute: i64,
) -> TransactionLog {
    let log = TransactionLog {
        id: coffer_shared::types::TransactionLogId::UNASSIGNED,
        account_id: account,
        transaction_type: kind.to_string(),
        amount,
        status: status.to_string(),
        timestamp: opened_at() + Duration::minutes(minute),
        details: String::new(),
    };
    store.insert_transaction_log(log).await.unwrap()
}

async fn balance_of(store: &MemoryStore, id: AccountId) -> Decimal {
    store.account(id).await.unwrap().current_balance
}

fn deposit(account_id: AccountId, amount: Decimal) -> NewTransactionLog {
    NewTransactionLog {
        account_id,
        transaction_type: transaction_types::DEPOSIT.to_string(),
        amount,
        status: transaction_statuses::COMPLETED.to_string(),
        details: "Cash deposit".to_string(),
        timestamp: None,
    }
}

struct FailingPublisher;

#[async_trait]
impl EventPublisher for FailingPublisher {
    async fn publish(
        &self,
        _event: &TransactionLoggedEvent,
        routing_key: &str,
    ) -> Result<(), PublishError> {
        Err(PublishError::Sink(format!("broker refused {routing_key}")))
    }
}

// =========================================================================
// Fund transfer
// =========================================================================

#[tokio::test]
async fn test_transfer_moves_funds_and_logs_once() {
    let store = MemoryStore::new();
    let x = seed_account(&store, 1, dec!(500)).await;
    let y = seed_account(&store, 1, dec!(100)).await;

    let ok = service(&store).transfer_funds(x.id, y.id, dec!(200)).await.unwrap();

    assert!(ok);
    assert_eq!(balance_of(&store, x.id).await, dec!(300));
    assert_eq!(balance_of(&store, y.id).await, dec!(300));

    let logs = store.transaction_logs().await;
    assert_eq!(logs.len(), 1);
    let log = &logs[0];
    assert_eq!(log.account_id, x.id);
    assert_eq!(log.transaction_type, "Transfer");
    assert_eq!(log.amount, dec!(200));
    assert_eq!(log.status, "Completed");
    assert_eq!(log.timestamp, now());
    assert_eq!(
        log.details,
        format!("Transferred 200 from account {} to account {}", x.id, y.id)
    );
}

#[tokio::test]
async fn test_transfer_insufficient_funds_changes_nothing() {
    let store = MemoryStore::new();
    let x = seed_account(&store, 1, dec!(50)).await;
    let y = seed_account(&store, 1, dec!(50)).await;

    let ok = service(&store).transfer_funds(x.id, y.id, dec!(100)).await.unwrap();

    assert!(!ok);
    assert_eq!(balance_of(&store, x.id).await, dec!(50));
    assert_eq!(balance_of(&store, y.id).await, dec!(50));
    assert!(store.transaction_logs().await.is_empty());
}

#[tokio::test]
async fn test_transfer_to_missing_account_keeps_source() {
    let store = MemoryStore::new();
    let x = seed_account(&store, 1, dec!(80)).await;

    let ok = service(&store)
        .transfer_funds(x.id, AccountId::new(999), dec!(30))
        .await
        .unwrap();

    assert!(!ok);
    assert_eq!(balance_of(&store, x.id).await, dec!(80));
    assert!(store.transaction_logs().await.is_empty());
}

#[tokio::test]
async fn test_transfer_rejects_invalid_amount_before_reading() {
    let store = MemoryStore::new();
    let ledger = service(&store);

    for amount in [dec!(0), dec!(-10), dec!(0.005), dec!(10000000000000000)] {
        let err = ledger
            .transfer_funds(AccountId::new(1), AccountId::new(2), amount)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }
}

#[tokio::test]
async fn test_transfer_to_same_account_logs_and_keeps_balance() {
    let store = MemoryStore::new();
    let x = seed_account(&store, 1, dec!(80)).await;

    let ok = service(&store).transfer_funds(x.id, x.id, dec!(30)).await.unwrap();

    assert!(ok);
    let stored = store.account(x.id).await.unwrap();
    assert_eq!(stored.current_balance, dec!(80));
    assert_eq!(stored.updated_at, now());
    assert_eq!(stored.version, x.version + 1);

    let logs = store.transaction_logs().await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].account_id, x.id);
    assert_eq!(logs[0].transaction_type, "Transfer");
    assert_eq!(logs[0].status, "Completed");
    assert_eq!(
        logs[0].details,
        format!("Transferred 30 from account {} to account {}", x.id, x.id)
    );
}

#[tokio::test]
async fn test_transfer_to_same_account_still_checks_funds() {
    let store = MemoryStore::new();
    let x = seed_account(&store, 1, dec!(20)).await;

    let err = service(&store)
        .try_transfer_funds(x.id, x.id, dec!(30))
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
    assert_eq!(store.account(x.id).await.unwrap(), x);
    assert!(store.transaction_logs().await.is_empty());
}

#[tokio::test]
async fn test_transfer_past_max_balance_changes_nothing() {
    let store = MemoryStore::new();
    let x = seed_account(&store, 1, dec!(100)).await;
    let y = seed_account(&store, 2, MAX_AMOUNT).await;

    let err = service(&store)
        .try_transfer_funds(x.id, y.id, dec!(0.01))
        .await
        .unwrap_err();

    assert_eq!(err, LedgerError::BalanceOutOfRange(y.id));
    assert_eq!(store.account(x.id).await.unwrap(), x);
    assert_eq!(store.account(y.id).await.unwrap(), y);
    assert!(store.transaction_logs().await.is_empty());
}

#[tokio::test]
async fn test_try_transfer_reports_cause() {
    let store = MemoryStore::new();
    let x = seed_account(&store, 1, dec!(10)).await;
    let y = seed_account(&store, 1, dec!(0)).await;
    let ledger = service(&store);

    let err = ledger.try_transfer_funds(x.id, y.id, dec!(10.01)).await.unwrap_err();
    assert_eq!(
        err,
        LedgerError::InsufficientFunds {
            account_id: x.id,
            balance: dec!(10),
            requested: dec!(10.01),
        }
    );

    let missing = AccountId::new(404);
    let err = ledger.try_transfer_funds(missing, y.id, dec!(1)).await.unwrap_err();
    assert_eq!(err, LedgerError::AccountNotFound(missing));
}

#[tokio::test]
async fn test_try_transfer_returns_receipt() {
    let store = MemoryStore::new();
    let x = seed_account(&store, 1, dec!(75.50)).await;
    let y = seed_account(&store, 2, dec!(0.50)).await;

    let receipt = service(&store)
        .try_transfer_funds(x.id, y.id, dec!(25.25))
        .await
        .unwrap();

    assert_eq!(receipt.from_balance, dec!(50.25));
    assert_eq!(receipt.to_balance, dec!(25.75));
    assert!(receipt.log.id.is_assigned());
    assert_eq!(store.transaction_logs().await, vec![receipt.log]);

    let stored = store.account(x.id).await.unwrap();
    assert_eq!(stored.version, x.version + 1);
    assert_eq!(stored.updated_at, now());
    assert_eq!(stored.created_at, opened_at());
}

#[tokio::test]
async fn test_transfer_flush_failure_rolls_back() {
    let store = MemoryStore::new();
    let x = seed_account(&store, 1, dec!(100)).await;
    let y = seed_account(&store, 1, dec!(100)).await;
    store.fail_next_flush("disk full").await;
    let ledger = service(&store);

    let err = ledger.try_transfer_funds(x.id, y.id, dec!(40)).await.unwrap_err();
    assert_eq!(err, LedgerError::Persistence(PersistenceError::Store("disk full".into())));
    assert_eq!(balance_of(&store, x.id).await, dec!(100));
    assert_eq!(balance_of(&store, y.id).await, dec!(100));

    assert!(ledger.transfer_funds(x.id, y.id, dec!(40)).await.unwrap());
    assert_eq!(balance_of(&store, x.id).await, dec!(60));
}

#[tokio::test]
async fn test_transfer_commit_failure_rolls_back() {
    let store = MemoryStore::new();
    let x = seed_account(&store, 1, dec!(100)).await;
    let y = seed_account(&store, 1, dec!(0)).await;
    store.fail_next_commit("connection reset").await;

    let ok = service(&store).transfer_funds(x.id, y.id, dec!(100)).await.unwrap();

    assert!(!ok);
    assert_eq!(balance_of(&store, x.id).await, dec!(100));
    assert_eq!(balance_of(&store, y.id).await, dec!(0));
    assert!(store.transaction_logs().await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_never_overdraw() {
    let store = MemoryStore::new();
    let source = seed_account(&store, 1, dec!(100)).await;
    let sink = seed_account(&store, 2, dec!(0)).await;
    let (from, to) = (source.id, sink.id);
    let ledger = Arc::new(service(&store));

    let handles = (0..10).map(|_| {
        let ledger = Arc::clone(&ledger);
        tokio::spawn(async move { ledger.transfer_funds(from, to, dec!(30)).await.unwrap() })
    });
    let results = join_all(handles).await;

    let succeeded = results
        .into_iter()
        .filter(|result| *result.as_ref().unwrap())
        .count();

    assert_eq!(succeeded, 3);
    assert_eq!(balance_of(&store, source.id).await, dec!(10));
    assert_eq!(balance_of(&store, sink.id).await, dec!(90));
    assert_eq!(store.transaction_logs().await.len(), 3);
}

// =========================================================================
// Common transactions
// =========================================================================

#[tokio::test]
async fn test_common_transactions_match_amount_and_type() {
    let store = MemoryStore::new();
    let a1 = seed_account(&store, 1, dec!(0)).await;
    let a2 = seed_account(&store, 2, dec!(0)).await;
    let a3 = seed_account(&store, 3, dec!(0)).await;
    let d1 = seed_log(&store, a1.id, "Deposit", "Completed", dec!(100), 0).await;
    let d2 = seed_log(&store, a2.id, "Deposit", "Completed", dec!(100), 5).await;
    seed_log(&store, a3.id, "Withdrawal", "Completed", dec!(50), 10).await;

    let common = service(&store)
        .get_common_transactions(&[a1.id, a2.id, a3.id])
        .await
        .unwrap();

    let ids: Vec<_> = common.iter().map(|c| c.transaction_id).collect();
    assert_eq!(ids, vec![d1.id, d2.id]);
    for entry in &common {
        assert_eq!(entry.account_ids, vec![a1.id, a2.id]);
        assert_eq!(entry.transaction_type, "Deposit");
        assert_eq!(entry.amount, dec!(100));
    }
}

#[tokio::test]
async fn test_common_transactions_ignore_unqueried_accounts() {
    let store = MemoryStore::new();
    let a1 = seed_account(&store, 1, dec!(0)).await;
    let a2 = seed_account(&store, 2, dec!(0)).await;
    let outsider = seed_account(&store, 3, dec!(0)).await;
    seed_log(&store, a1.id, "Deposit", "Completed", dec!(20), 0).await;
    seed_log(&store, outsider.id, "Deposit", "Completed", dec!(20), 1).await;

    let common = service(&store)
        .get_common_transactions(&[a1.id, a2.id])
        .await
        .unwrap();

    assert!(common.is_empty());
}

#[tokio::test]
async fn test_common_transactions_need_two_distinct_accounts() {
    let store = MemoryStore::new();
    let ledger = service(&store);

    for ids in [vec![], vec![AccountId::new(1)], vec![AccountId::new(1), AccountId::new(1)]] {
        let err = ledger.get_common_transactions(&ids).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }
}

// =========================================================================
// Balance summary
// =========================================================================

#[tokio::test]
async fn test_balance_summary_preserves_stored_balance() {
    let store = MemoryStore::new();
    let account = seed_account(&store, 7, dec!(500)).await;
    seed_log(&store, account.id, "Deposit", "Completed", dec!(100), 0).await;
    seed_log(&store, account.id, "Withdrawal", "Completed", dec!(40), 1).await;

    let summary = service(&store)
        .get_account_balance_summary(UserId::new(7))
        .await
        .unwrap();

    assert_eq!(summary.user_id, UserId::new(7));
    assert_eq!(summary.total_accounts, 1);
    assert_eq!(summary.total_deposits, dec!(100));
    assert_eq!(summary.total_withdrawals, dec!(40));
    assert_eq!(summary.total_balance, dec!(500));
    assert_eq!(summary.accounts[0].current_balance, dec!(500));
}

#[tokio::test]
async fn test_balance_summary_for_user_without_accounts() {
    let store = MemoryStore::new();
    seed_account(&store, 1, dec!(10)).await;

    let summary = service(&store)
        .get_account_balance_summary(UserId::new(2))
        .await
        .unwrap();

    assert_eq!(summary, BalanceSummary::empty(UserId::new(2)));
}

#[tokio::test]
async fn test_balance_summary_only_counts_own_accounts() {
    let store = MemoryStore::new();
    let mine = seed_account(&store, 1, dec!(10)).await;
    let second = seed_account(&store, 1, dec!(20)).await;
    let theirs = seed_account(&store, 2, dec!(1000)).await;
    seed_log(&store, mine.id, "Deposit", "Completed", dec!(10), 0).await;
    seed_log(&store, second.id, "Deposit", "Completed", dec!(20), 1).await;
    seed_log(&store, theirs.id, "Deposit", "Completed", dec!(1000), 2).await;

    let summary = service(&store)
        .get_account_balance_summary(UserId::new(1))
        .await
        .unwrap();

    assert_eq!(summary.total_accounts, 2);
    assert_eq!(summary.total_deposits, dec!(30));
    assert_eq!(summary.total_balance, dec!(30));
}

// =========================================================================
// Write gateway
// =========================================================================

#[tokio::test]
async fn test_gateway_overrides_caller_timestamp() {
    let store = MemoryStore::new();
    let account = seed_account(&store, 1, dec!(0)).await;
    let mut input = deposit(account.id, dec!(42.10));
    input.timestamp = Some(Utc.with_ymd_and_hms(1999, 12, 31, 23, 59, 59).unwrap());

    let log = gateway(&store).create_transaction_log(input).await.unwrap();

    assert!(log.id.is_assigned());
    assert_eq!(log.timestamp, now());
    assert_eq!(store.transaction_logs().await, vec![log]);
}

#[tokio::test]
async fn test_gateway_publishes_after_write() {
    let store = MemoryStore::new();
    let account = seed_account(&store, 1, dec!(0)).await;
    let publisher = Arc::new(BroadcastPublisher::new(8));
    let mut events = publisher.subscribe();
    let gateway = gateway(&store).with_publisher(publisher, "ledger.audit");
    assert!(gateway.has_publisher());

    let log = gateway
        .create_transaction_log(deposit(account.id, dec!(15)))
        .await
        .unwrap();

    let envelope = events.recv().await.unwrap();
    assert_eq!(envelope.routing_key, "ledger.audit");
    assert_eq!(envelope.event, TransactionLoggedEvent::from(&log));
}

#[tokio::test]
async fn test_gateway_swallows_publish_failure() {
    let store = MemoryStore::new();
    let account = seed_account(&store, 1, dec!(0)).await;
    let gateway = gateway(&store).with_publisher(Arc::new(FailingPublisher), DEFAULT_ROUTING_KEY);

    let log = gateway
        .create_transaction_log(deposit(account.id, dec!(5)))
        .await
        .unwrap();

    assert_eq!(store.transaction_logs().await, vec![log]);
}

#[tokio::test]
async fn test_gateway_without_subscribers_still_writes() {
    let store = MemoryStore::new();
    let account = seed_account(&store, 1, dec!(0)).await;
    let gateway =
        gateway(&store).with_publisher(Arc::new(BroadcastPublisher::new(4)), DEFAULT_ROUTING_KEY);

    gateway
        .create_transaction_log(deposit(account.id, dec!(5)))
        .await
        .unwrap();

    assert_eq!(store.transaction_logs().await.len(), 1);
}

#[tokio::test]
async fn test_gateway_without_publisher_writes() {
    let store = MemoryStore::new();
    let account = seed_account(&store, 1, dec!(0)).await;
    let gateway = gateway(&store);
    assert!(!gateway.has_publisher());

    gateway
        .create_transaction_log(deposit(account.id, dec!(5)))
        .await
        .unwrap();

    assert_eq!(store.transaction_logs().await.len(), 1);
}

#[tokio::test]
async fn test_gateway_rejects_missing_account() {
    let store = MemoryStore::new();

    let err = gateway(&store)
        .create_transaction_log(deposit(AccountId::new(3), dec!(5)))
        .await
        .unwrap_err();

    assert_eq!(err, LedgerError::AccountNotFound(AccountId::new(3)));
    assert!(store.transaction_logs().await.is_empty());
}

#[tokio::test]
async fn test_gateway_rejects_invalid_input() {
    let store = MemoryStore::new();
    let account = seed_account(&store, 1, dec!(0)).await;

    let mut input = deposit(account.id, dec!(1.001));
    let err = gateway(&store).create_transaction_log(input.clone()).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    input.amount = dec!(1);
    input.status = String::new();
    let err = gateway(&store).create_transaction_log(input).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[tokio::test]
async fn test_gateway_surfaces_write_failure() {
    let store = MemoryStore::new();
    let account = seed_account(&store, 1, dec!(0)).await;
    store.fail_next_flush("read-only replica").await;

    let err = gateway(&store)
        .create_transaction_log(deposit(account.id, dec!(5)))
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::Persistence(PersistenceError::Store(_))));
    assert!(store.transaction_logs().await.is_empty());
}

#[tokio::test]
async fn test_gateway_lists_newest_first() {
    let store = MemoryStore::new();
    let account = seed_account(&store, 1, dec!(0)).await;
    let other = seed_account(&store, 2, dec!(0)).await;
    let first = seed_log(&store, account.id, "Deposit", "Completed", dec!(1), 0).await;
    let second = seed_log(&store, account.id, "Withdrawal", "Pending", dec!(2), 9).await;
    seed_log(&store, other.id, "Deposit", "Completed", dec!(3), 5).await;

    let logs = gateway(&store)
        .transaction_logs_for_account(account.id)
        .await
        .unwrap();

    assert_eq!(logs, vec![second, first]);
}
