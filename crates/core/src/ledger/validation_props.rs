//! Property-based tests for ledger input validation.

use coffer_shared::types::AccountId;
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::validation::{
    MAX_AMOUNT, ValidationError, distinct_account_set, has_cent_precision, validate_transfer,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// *For any* whole-cent positive amount, validation accepts the transfer.
    #[test]
    fn prop_whole_cent_amounts_accepted(cents in 1i64..100_000_000i64) {
        let amount = Decimal::new(cents, 2);
        prop_assert!(has_cent_precision(amount));
        prop_assert!(validate_transfer(amount).is_ok());
    }

    /// *For any* amount with a non-zero third decimal, validation rejects it.
    #[test]
    fn prop_sub_cent_amounts_rejected(mills in 1i64..100_000_000i64) {
        prop_assume!(mills % 10 != 0);
        let amount = Decimal::new(mills, 3);
        prop_assert_eq!(
            validate_transfer(amount),
            Err(ValidationError::ExcessPrecision(amount))
        );
    }

    /// *For any* zero or negative amount, validation rejects it.
    #[test]
    fn prop_non_positive_amounts_rejected(cents in -100_000_000i64..=0i64) {
        let amount = Decimal::new(cents, 2);
        prop_assert_eq!(
            validate_transfer(amount),
            Err(ValidationError::NonPositiveAmount(amount))
        );
    }

    /// *For any* whole-cent amount past the range, validation rejects it.
    #[test]
    fn prop_out_of_range_amounts_rejected(extra in 1i64..i64::MAX) {
        let amount = MAX_AMOUNT + Decimal::new(extra, 2);
        prop_assert_eq!(
            validate_transfer(amount),
            Err(ValidationError::AmountTooLarge(amount))
        );
    }

    /// *For any* id list, the distinct set is sorted, duplicate-free and
    /// accepted exactly when it has two or more members.
    #[test]
    fn prop_distinct_account_set(raw in prop::collection::vec(1i64..6, 0..12)) {
        let ids: Vec<AccountId> = raw.iter().copied().map(AccountId::new).collect();
        let mut expected = ids.clone();
        expected.sort_unstable();
        expected.dedup();

        match distinct_account_set(&ids) {
            Ok(distinct) => {
                prop_assert!(expected.len() >= 2);
                prop_assert_eq!(distinct, expected);
            }
            Err(ValidationError::TooFewAccounts { given, .. }) => {
                prop_assert!(expected.len() < 2);
                prop_assert_eq!(given, expected.len());
            }
            Err(other) => prop_assert!(false, "unexpected error: {other}"),
        }
    }
}
