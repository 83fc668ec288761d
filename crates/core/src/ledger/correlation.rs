//! Common-transaction detection.
//!
//! Rows are correlated purely by equal amount and equal transaction type on
//! different accounts. Nothing checks that a debit on one side matches a
//! credit on the other.

use std::collections::{BTreeMap, BTreeSet};

use coffer_shared::types::{AccountId, TransactionLogId};
use rust_decimal::Decimal;

use super::types::{CorrelatedTransaction, TransactionLog};

#[derive(Default)]
struct Group<'a> {
    accounts: BTreeSet<AccountId>,
    rows: BTreeMap<TransactionLogId, &'a TransactionLog>,
}

/// Returns every row whose `(amount, transaction_type)` also occurs on at
/// least one other account in `logs`.
///
/// Each row appears once, tagged with the sorted distinct accounts of its
/// group. Output is ordered by `(timestamp, transaction_id)`. Amounts that
/// differ only in trailing zeros fall into the same group.
#[must_use]
pub fn find_common_transactions(logs: &[TransactionLog]) -> Vec<CorrelatedTransaction> {
    let mut groups: BTreeMap<(Decimal, &str), Group<'_>> = BTreeMap::new();
    for log in logs {
        let group = groups
            .entry((log.amount.normalize(), log.transaction_type.as_str()))
            .or_default();
        group.accounts.insert(log.account_id);
        group.rows.insert(log.id, log);
    }

    let mut correlated: Vec<CorrelatedTransaction> = groups
        .into_values()
        .filter(|group| group.accounts.len() > 1)
        .flat_map(|group| {
            let account_ids: Vec<AccountId> = group.accounts.into_iter().collect();
            group
                .rows
                .into_values()
                .map(move |log| CorrelatedTransaction {
                    transaction_id: log.id,
                    account_ids: account_ids.clone(),
                    transaction_type: log.transaction_type.clone(),
                    amount: log.amount,
                    timestamp: log.timestamp,
                })
                .collect::<Vec<_>>()
        })
        .collect();

    correlated.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then(a.transaction_id.cmp(&b.transaction_id))
    });
    correlated
}
