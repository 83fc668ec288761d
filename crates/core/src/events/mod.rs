//! Domain events emitted after durable ledger writes.
//!
//! Publishing is best-effort. A publisher failure is reported through
//! [`PublishError`] and never turns a successful write into a failed one.

pub mod broadcast;
pub mod consumer;
pub mod publisher;

pub use broadcast::{BroadcastPublisher, EventEnvelope};
pub use consumer::TransactionLoggedConsumer;
pub use publisher::{EventPublisher, PublishError, TransactionLoggedEvent};
