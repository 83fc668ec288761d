//! Shared identifiers, errors, and configuration for Coffer.
//!
//! This crate provides common types used across all other crates:
//! - Typed numeric IDs for accounts, users, and transaction logs
//! - The boundary error type handed to transport layers
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::AppError;
pub use types::{AccountId, TransactionLogId, UserId};
