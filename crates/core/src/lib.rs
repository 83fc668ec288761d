//! Core business logic for Coffer.
//!
//! This crate holds the ledger consistency core with ZERO web or database
//! dependencies. Storage is reached only through the [`store`] contracts, so
//! the same algorithms run against the in-memory store and the SeaORM one.
//!
//! # Modules
//!
//! - `ledger` - Fund transfer, common-transaction detection, balance summary, write gateway
//! - `store` - Staged repositories, unit of work, in-memory store
//! - `events` - Transaction-logged events and their publishers
//! - `clock` - Time source used to stamp writes

pub mod clock;
pub mod events;
pub mod ledger;
pub mod store;
