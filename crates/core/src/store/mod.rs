//! Storage contracts: staged repositories, sessions, and the unit of work.
//!
//! Reads go straight to the store. Writes are staged in a [`ChangeSet`] and
//! only become durable when the owning [`UnitOfWork`] saves or commits.
//! A backend supplies a [`Store`] (session factory) and a [`Session`]
//! (transaction handle plus repositories bound to it).

pub mod change_set;
pub mod memory;
pub mod unit_of_work;


use std::fmt::{Debug, Display};
use std::hash::Hash;

use async_trait::async_trait;
use coffer_shared::types::{AccountId, UserId};

use crate::ledger::{Account, PersistenceError, TransactionLog};

pub use change_set::{ChangeSet, StagedWrite};
pub use memory::{MemorySession, MemoryStore};
pub use unit_of_work::{UnitOfWork, UnitOfWorkState};

/// A persisted record with a store-assigned identity.
pub trait Entity: Clone + Debug + Send + Sync + 'static {
    /// Identity type.
    type Id: Copy + Eq + Ord + Hash + Debug + Display + Send + Sync + 'static;

    /// Name used in logs and conflict errors.
    const NAME: &'static str;

    /// Returns the identity.
    fn id(&self) -> Self::Id;
}

/// Generic per-entity access object.
///
/// `get_*` reads are immediate. `add`, `update` and `remove` only stage;
/// nothing is persisted until the owning unit of work flushes.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// Reads one entity.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Store` if the read fails.
    async fn get_by_id(&self, id: T::Id) -> Result<Option<T>, PersistenceError>;

    /// Reads every entity, ordered by identity.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Store` if the read fails.
    async fn get_all(&self) -> Result<Vec<T>, PersistenceError>;

    /// Stages an insert.
    fn add(&mut self, entity: T);

    /// Stages an update.
    fn update(&mut self, entity: T);

    /// Stages a delete.
    fn remove(&mut self, entity: T);

    /// Number of staged writes.
    fn pending(&self) -> usize;

    /// Drops every staged write.
    fn discard(&mut self);

    /// Entities inserted by flushes since the last call, with their
    /// store-assigned identities.
    fn take_inserted(&mut self) -> Vec<T>;
}

/// Account queries beyond the generic repository.
#[async_trait]
pub trait AccountRepository: Repository<Account> {
    /// Accounts owned by `user_id`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Store` if the read fails.
    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Account>, PersistenceError>;
}

/// Transaction log queries beyond the generic repository.
#[async_trait]
pub trait TransactionLogRepository: Repository<TransactionLog> {
    /// Logs belonging to any of `account_ids`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Store` if the read fails.
    async fn find_by_accounts(
        &self,
        account_ids: &[AccountId],
    ) -> Result<Vec<TransactionLog>, PersistenceError>;

    /// Logs of one account, newest first.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Store` if the read fails.
    async fn find_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<TransactionLog>, PersistenceError>;
}

/// One logical connection to the store plus the repositories bound to it.
///
/// The state machine lives in [`UnitOfWork`]; sessions only perform the
/// store-level steps.
#[async_trait]
pub trait Session: Send {
    /// Account repository type.
    type Accounts: AccountRepository;
    /// Transaction log repository type.
    type TransactionLogs: TransactionLogRepository;

    /// Account repository bound to this session.
    fn accounts(&self) -> &Self::Accounts;

    /// Mutable account repository bound to this session.
    fn accounts_mut(&mut self) -> &mut Self::Accounts;

    /// Transaction log repository bound to this session.
    fn transaction_logs(&self) -> &Self::TransactionLogs;

    /// Mutable transaction log repository bound to this session.
    fn transaction_logs_mut(&mut self) -> &mut Self::TransactionLogs;

    /// Opens a store transaction.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Store` if the store refuses.
    async fn begin(&mut self) -> Result<(), PersistenceError>;

    /// Finalizes the open transaction. The transaction handle is released
    /// whether or not this succeeds.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Store` if finalizing fails.
    async fn commit(&mut self) -> Result<(), PersistenceError>;

    /// Aborts the open transaction, if any.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Store` if the abort fails.
    async fn rollback(&mut self) -> Result<(), PersistenceError>;

    /// Writes every staged change of both repositories and returns how many
    /// were applied. Without an open transaction the batch is applied in a
    /// short transaction of its own. Account inserts and updates are written
    /// before transaction logs, account removals after them. Staged writes
    /// are kept if this fails.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Conflict` on a stale versioned write and
    /// `PersistenceError::Store` on any other failure.
    async fn flush(&mut self) -> Result<usize, PersistenceError>;
}

/// Session factory shared by services.
pub trait Store: Send + Sync {
    /// Session type.
    type Session: Session;

    /// Opens a fresh session with empty repositories.
    fn open_session(&self) -> Self::Session;
}
