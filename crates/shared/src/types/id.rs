//! Typed IDs for type-safe entity references.
//!
//! Store identities are plain auto-increment integers. Wrapping them prevents
//! passing a `UserId` where an `AccountId` is expected.

use serde::{Deserialize, Serialize};

/// Macro to generate typed ID wrappers around a store-assigned `i64`.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Placeholder identity for records the store has not assigned yet.
            pub const UNASSIGNED: Self = Self(0);

            /// Creates an ID from a raw store value.
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Returns the raw store value.
            #[must_use]
            pub const fn into_inner(self) -> i64 {
                self.0
            }

            /// Returns true once the store has assigned this identity.
            #[must_use]
            pub const fn is_assigned(self) -> bool {
                self.0 > 0
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.trim().parse()?))
            }
        }
    };
}

typed_id!(AccountId, "Unique identifier for a bank account.");
typed_id!(UserId, "Unique identifier for the user owning accounts.");
typed_id!(TransactionLogId, "Unique identifier for a transaction log row.");

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
