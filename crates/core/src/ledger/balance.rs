//! Balance summary aggregation.
//!
//! The stored `current_balance` is authoritative and reported unchanged. It
//! is never reconciled against deposits minus withdrawals; transfers and
//! other movement types make the two diverge.

use std::collections::HashMap;

use coffer_shared::types::{AccountId, UserId};
use rust_decimal::Decimal;

use super::types::{
    Account, AccountSummary, BalanceSummary, TransactionLog, transaction_statuses,
    transaction_types,
};

#[derive(Default)]
struct Flows {
    deposits: Decimal,
    withdrawals: Decimal,
}

/// Builds the summary for `user_id` from its accounts and their logs.
///
/// Only completed deposits and withdrawals count. Logs of accounts not in
/// `accounts` are ignored. Per-account lines are ordered by account id.
#[must_use]
pub fn summarize(user_id: UserId, accounts: &[Account], logs: &[TransactionLog]) -> BalanceSummary {
    if accounts.is_empty() {
        return BalanceSummary::empty(user_id);
    }

    let mut flows: HashMap<AccountId, Flows> = accounts
        .iter()
        .map(|account| (account.id, Flows::default()))
        .collect();
    for log in logs {
        if log.status != transaction_statuses::COMPLETED {
            continue;
        }
        let Some(flow) = flows.get_mut(&log.account_id) else {
            continue;
        };
        match log.transaction_type.as_str() {
            transaction_types::DEPOSIT => flow.deposits += log.amount,
            transaction_types::WITHDRAWAL => flow.withdrawals += log.amount,
            _ => {}
        }
    }

    let mut ordered: Vec<&Account> = accounts.iter().collect();
    ordered.sort_by_key(|account| account.id);

    let mut summary = BalanceSummary::empty(user_id);
    for account in ordered {
        let flow = flows.remove(&account.id).unwrap_or_default();
        summary.total_deposits += flow.deposits;
        summary.total_withdrawals += flow.withdrawals;
        summary.total_balance += account.current_balance;
        summary.accounts.push(AccountSummary {
            account_id: account.id,
            account_number: account.account_number.clone(),
            account_type: account.account_type.clone(),
            total_deposits: flow.deposits,
            total_withdrawals: flow.withdrawals,
            current_balance: account.current_balance,
        });
    }
    summary.total_accounts = summary.accounts.len();
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use coffer_shared::types::TransactionLogId;
    use rust_decimal_macros::dec;

    fn make_account(id: i64, balance: Decimal) -> Account {
        let mut account = Account::new(UserId::new(1), "Savings", format!("SAV-{id}"), balance, Utc::now());
        account.id = AccountId::new(id);
        account
    }

    fn make_log(id: i64, account: i64, kind: &str, status: &str, amount: Decimal) -> TransactionLog {
        TransactionLog {
            id: TransactionLogId::new(id),
            account_id: AccountId::new(account),
            transaction_type: kind.to_string(),
            amount,
            status: status.to_string(),
            timestamp: Utc::now(),
            details: String::new(),
        }
    }

    #[test]
    fn test_no_accounts_gives_zeroed_summary() {
        let summary = summarize(UserId::new(4), &[], &[]);
        assert_eq!(summary, BalanceSummary::empty(UserId::new(4)));
        assert_eq!(summary.total_accounts, 0);
        assert_eq!(summary.total_balance, Decimal::ZERO);
    }

    #[test]
    fn test_stored_balance_is_not_recomputed() {
        let accounts = vec![make_account(1, dec!(500))];
        let logs = vec![
            make_log(1, 1, "Deposit", "Completed", dec!(100)),
            make_log(2, 1, "Withdrawal", "Completed", dec!(40)),
        ];

        let summary = summarize(UserId::new(1), &accounts, &logs);

        assert_eq!(summary.total_accounts, 1);
        assert_eq!(summary.total_deposits, dec!(100));
        assert_eq!(summary.total_withdrawals, dec!(40));
        assert_eq!(summary.total_balance, dec!(500));
        assert_eq!(summary.accounts[0].current_balance, dec!(500));
        assert_eq!(summary.accounts[0].account_number, "SAV-1");
    }

    #[test]
    fn test_only_completed_deposits_and_withdrawals_count() {
        let accounts = vec![make_account(1, dec!(0))];
        let logs = vec![
            make_log(1, 1, "Deposit", "Pending", dec!(10)),
            make_log(2, 1, "Deposit", "Failed", dec!(20)),
            make_log(3, 1, "Transfer", "Completed", dec!(30)),
            make_log(4, 1, "Deposit", "Completed", dec!(40)),
            make_log(5, 1, "Withdrawal", "Pending", dec!(50)),
        ];

        let summary = summarize(UserId::new(1), &accounts, &logs);

        assert_eq!(summary.total_deposits, dec!(40));
        assert_eq!(summary.total_withdrawals, Decimal::ZERO);
    }

    #[test]
    fn test_totals_sum_accounts_in_id_order() {
        let accounts = vec![make_account(2, dec!(20)), make_account(1, dec!(10))];
        let logs = vec![
            make_log(1, 1, "Deposit", "Completed", dec!(5)),
            make_log(2, 2, "Deposit", "Completed", dec!(7)),
            make_log(3, 2, "Withdrawal", "Completed", dec!(3)),
            make_log(4, 99, "Deposit", "Completed", dec!(1000)),
        ];

        let summary = summarize(UserId::new(1), &accounts, &logs);

        let ids: Vec<AccountId> = summary.accounts.iter().map(|a| a.account_id).collect();
        assert_eq!(ids, vec![AccountId::new(1), AccountId::new(2)]);
        assert_eq!(summary.total_deposits, dec!(12));
        assert_eq!(summary.total_withdrawals, dec!(3));
        assert_eq!(summary.total_balance, dec!(30));
        assert_eq!(summary.accounts[1].total_deposits, dec!(7));
    }
}
