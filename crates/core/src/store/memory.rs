//! In-memory store.
//!
//! Transactions are serialized: `begin` takes an owned lock on the whole
//! state until commit or rollback, so two transfers can never interleave
//! between balance check and write. Flushes are applied to a copy and
//! swapped in only when every write succeeded. Account writes are versioned
//! exactly like the database backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use coffer_shared::types::{AccountId, TransactionLogId, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{
    AccountRepository, ChangeSet, Entity, Repository, Session, StagedWrite, Store,
    TransactionLogRepository,
};
use crate::ledger::{Account, PersistenceError, TransactionLog};

/// Tables and id counters.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    accounts: BTreeMap<AccountId, Account>,
    transaction_logs: BTreeMap<TransactionLogId, TransactionLog>,
    last_account_id: i64,
    last_transaction_log_id: i64,
}

/// Entities the in-memory store can hold.
pub trait MemoryRecord: Entity {
    /// The table holding this entity.
    fn table(state: &MemoryState) -> &BTreeMap<Self::Id, Self>;

    /// Inserts `entity`, assigning an identity when it has none.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Store` on a duplicate identity or a broken
    /// reference.
    fn insert(state: &mut MemoryState, entity: Self) -> Result<Self, PersistenceError>;

    /// Replaces the stored row.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Conflict` if the row is gone or stale.
    fn replace(state: &mut MemoryState, entity: Self) -> Result<(), PersistenceError>;

    /// Deletes the stored row.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Conflict` if the row is gone or stale.
    fn delete(state: &mut MemoryState, entity: &Self) -> Result<(), PersistenceError>;
}

fn conflict<T: Entity>(id: T::Id) -> PersistenceError {
    PersistenceError::Conflict {
        entity: T::NAME,
        id: id.to_string(),
    }
}

impl MemoryRecord for Account {
    fn table(state: &MemoryState) -> &BTreeMap<AccountId, Self> {
        &state.accounts
    }

    fn insert(state: &mut MemoryState, mut entity: Self) -> Result<Self, PersistenceError> {
        if entity.id.is_assigned() {
            if state.accounts.contains_key(&entity.id) {
                return Err(PersistenceError::Store(format!(
                    "duplicate account id {}",
                    entity.id
                )));
            }
        } else {
            entity.id = AccountId::new(state.last_account_id + 1);
        }
        state.last_account_id = state.last_account_id.max(entity.id.into_inner());
        entity.version = 1;
        state.accounts.insert(entity.id, entity.clone());
        Ok(entity)
    }

    fn replace(state: &mut MemoryState, mut entity: Self) -> Result<(), PersistenceError> {
        let stored = state
            .accounts
            .get_mut(&entity.id)
            .ok_or_else(|| conflict::<Self>(entity.id))?;
        if stored.version != entity.version {
            return Err(conflict::<Self>(entity.id));
        }
        entity.version += 1;
        *stored = entity;
        Ok(())
    }

    fn delete(state: &mut MemoryState, entity: &Self) -> Result<(), PersistenceError> {
        match state.accounts.get(&entity.id) {
            Some(stored) if stored.version == entity.version => {}
            _ => return Err(conflict::<Self>(entity.id)),
        }
        if state
            .transaction_logs
            .values()
            .any(|log| log.account_id == entity.id)
        {
            return Err(PersistenceError::Store(format!(
                "account {} still has transaction logs",
                entity.id
            )));
        }
        state.accounts.remove(&entity.id);
        Ok(())
    }
}

impl MemoryRecord for TransactionLog {
    fn table(state: &MemoryState) -> &BTreeMap<TransactionLogId, Self> {
        &state.transaction_logs
    }

    fn insert(state: &mut MemoryState, mut entity: Self) -> Result<Self, PersistenceError> {
        if !state.accounts.contains_key(&entity.account_id) {
            return Err(PersistenceError::Store(format!(
                "transaction log references missing account {}",
                entity.account_id
            )));
        }
        if entity.id.is_assigned() {
            if state.transaction_logs.contains_key(&entity.id) {
                return Err(PersistenceError::Store(format!(
                    "duplicate transaction log id {}",
                    entity.id
                )));
            }
        } else {
            entity.id = TransactionLogId::new(state.last_transaction_log_id + 1);
        }
        state.last_transaction_log_id = state
            .last_transaction_log_id
            .max(entity.id.into_inner());
        state.transaction_logs.insert(entity.id, entity.clone());
        Ok(entity)
    }

    fn replace(state: &mut MemoryState, entity: Self) -> Result<(), PersistenceError> {
        if !state.accounts.contains_key(&entity.account_id) {
            return Err(PersistenceError::Store(format!(
                "transaction log references missing account {}",
                entity.account_id
            )));
        }
        let stored = state
            .transaction_logs
            .get_mut(&entity.id)
            .ok_or_else(|| conflict::<Self>(entity.id))?;
        *stored = entity;
        Ok(())
    }

    fn delete(state: &mut MemoryState, entity: &Self) -> Result<(), PersistenceError> {
        state
            .transaction_logs
            .remove(&entity.id)
            .map(|_| ())
            .ok_or_else(|| conflict::<Self>(entity.id))
    }
}

fn apply<'a, T: MemoryRecord>(
    state: &mut MemoryState,
    writes: impl IntoIterator<Item = &'a StagedWrite<T>>,
) -> Result<Vec<T>, PersistenceError> {
    let mut inserted = Vec::new();
    for write in writes {
        match write {
            StagedWrite::Add(entity) => inserted.push(T::insert(state, entity.clone())?),
            StagedWrite::Update(entity) => T::replace(state, entity.clone())?,
            StagedWrite::Remove(entity) => T::delete(state, entity)?,
        }
    }
    Ok(inserted)
}

/// Account inserts and updates go first, then transaction logs, then account
/// removals.
fn apply_batch(
    state: &mut MemoryState,
    accounts: &ChangeSet<Account>,
    transaction_logs: &ChangeSet<TransactionLog>,
) -> Result<(Vec<Account>, Vec<TransactionLog>), PersistenceError> {
    let mut working = state.clone();
    let inserted_accounts = apply(&mut working, accounts.upserts())?;
    let inserted_logs = apply(&mut working, transaction_logs.staged())?;
    apply(&mut working, accounts.removals())?;
    *state = working;
    Ok((inserted_accounts, inserted_logs))
}

#[derive(Debug, Default)]
struct Faults {
    flush: Option<String>,
    commit: Option<String>,
}

/// Shared in-memory store. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<Mutex<Faults>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an account directly, outside any unit of work.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Store` on a duplicate identity.
    pub async fn insert_account(&self, account: Account) -> Result<Account, PersistenceError> {
        let mut state = self.state.lock().await;
        Account::insert(&mut state, account)
    }

    /// Inserts a transaction log directly, outside any unit of work.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Store` if the account does not exist.
    pub async fn insert_transaction_log(
        &self,
        log: TransactionLog,
    ) -> Result<TransactionLog, PersistenceError> {
        let mut state = self.state.lock().await;
        TransactionLog::insert(&mut state, log)
    }

    /// Committed copy of one account.
    pub async fn account(&self, id: AccountId) -> Option<Account> {
        self.state.lock().await.accounts.get(&id).cloned()
    }

    /// Committed copy of every transaction log, ordered by id.
    pub async fn transaction_logs(&self) -> Vec<TransactionLog> {
        self.state
            .lock()
            .await
            .transaction_logs
            .values()
            .cloned()
            .collect()
    }

    /// Makes the next non-empty flush fail with `message`.
    pub async fn fail_next_flush(&self, message: impl Into<String>) {
        self.faults.lock().await.flush = Some(message.into());
    }

    /// Makes the next transaction commit fail with `message`. Nothing of that
    /// transaction is kept.
    pub async fn fail_next_commit(&self, message: impl Into<String>) {
        self.faults.lock().await.commit = Some(message.into());
    }
}

impl Store for MemoryStore {
    type Session = MemorySession;

    fn open_session(&self) -> MemorySession {
        let handle = Handle {
            state: Arc::clone(&self.state),
            txn: Arc::new(Mutex::new(None)),
        };
        MemorySession {
            faults: Arc::clone(&self.faults),
            accounts: MemoryRepository::new(handle.clone()),
            transaction_logs: MemoryRepository::new(handle.clone()),
            handle,
        }
    }
}

/// Open transaction: the owned state lock plus the state to restore.
///
/// Dropping it without committing restores the snapshot.
#[derive(Debug)]
struct MemoryTxn {
    guard: OwnedMutexGuard<MemoryState>,
    snapshot: Option<MemoryState>,
}

impl Drop for MemoryTxn {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.guard = snapshot;
        }
    }
}

/// What a session and its repositories share.
#[derive(Debug, Clone)]
struct Handle {
    state: Arc<Mutex<MemoryState>>,
    txn: Arc<Mutex<Option<MemoryTxn>>>,
}

impl Handle {
    /// Reads through the open transaction if there is one, otherwise takes
    /// the store lock briefly.
    async fn read<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&MemoryState) -> R + Send,
        R: Send,
    {
        let txn = self.txn.lock().await;
        if let Some(open) = txn.as_ref() {
            return f(&*open.guard);
        }
        drop(txn);

        let state = self.state.lock().await;
        f(&*state)
    }
}

/// Repository over one in-memory table.
#[derive(Debug)]
pub struct MemoryRepository<T> {
    handle: Handle,
    changes: ChangeSet<T>,
}

impl<T> MemoryRepository<T> {
    fn new(handle: Handle) -> Self {
        Self {
            handle,
            changes: ChangeSet::new(),
        }
    }
}

#[async_trait]
impl<T: MemoryRecord> Repository<T> for MemoryRepository<T> {
    async fn get_by_id(&self, id: T::Id) -> Result<Option<T>, PersistenceError> {
        Ok(self
            .handle
            .read(|state| T::table(state).get(&id).cloned())
            .await)
    }

    async fn get_all(&self) -> Result<Vec<T>, PersistenceError> {
        Ok(self
            .handle
            .read(|state| T::table(state).values().cloned().collect())
            .await)
    }

    fn add(&mut self, entity: T) {
        self.changes.stage(StagedWrite::Add(entity));
    }

    fn update(&mut self, entity: T) {
        self.changes.stage(StagedWrite::Update(entity));
    }

    fn remove(&mut self, entity: T) {
        self.changes.stage(StagedWrite::Remove(entity));
    }

    fn pending(&self) -> usize {
        self.changes.len()
    }

    fn discard(&mut self) {
        self.changes.discard();
    }

    fn take_inserted(&mut self) -> Vec<T> {
        self.changes.take_inserted()
    }
}

#[async_trait]
impl AccountRepository for MemoryRepository<Account> {
    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Account>, PersistenceError> {
        Ok(self
            .handle
            .read(|state| {
                state
                    .accounts
                    .values()
                    .filter(|account| account.user_id == user_id)
                    .cloned()
                    .collect()
            })
            .await)
    }
}

#[async_trait]
impl TransactionLogRepository for MemoryRepository<TransactionLog> {
    async fn find_by_accounts(
        &self,
        account_ids: &[AccountId],
    ) -> Result<Vec<TransactionLog>, PersistenceError> {
        Ok(self
            .handle
            .read(|state| {
                state
                    .transaction_logs
                    .values()
                    .filter(|log| account_ids.contains(&log.account_id))
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn find_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<TransactionLog>, PersistenceError> {
        let mut logs: Vec<TransactionLog> = self
            .handle
            .read(|state| {
                state
                    .transaction_logs
                    .values()
                    .filter(|log| log.account_id == account_id)
                    .cloned()
                    .collect()
            })
            .await;
        logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(logs)
    }
}

/// Session over a [`MemoryStore`].
#[derive(Debug)]
pub struct MemorySession {
    handle: Handle,
    faults: Arc<Mutex<Faults>>,
    accounts: MemoryRepository<Account>,
    transaction_logs: MemoryRepository<TransactionLog>,
}

#[async_trait]
impl Session for MemorySession {
    type Accounts = MemoryRepository<Account>;
    type TransactionLogs = MemoryRepository<TransactionLog>;

    fn accounts(&self) -> &Self::Accounts {
        &self.accounts
    }

    fn accounts_mut(&mut self) -> &mut Self::Accounts {
        &mut self.accounts
    }

    fn transaction_logs(&self) -> &Self::TransactionLogs {
        &self.transaction_logs
    }

    fn transaction_logs_mut(&mut self) -> &mut Self::TransactionLogs {
        &mut self.transaction_logs
    }

    async fn begin(&mut self) -> Result<(), PersistenceError> {
        let mut txn = self.handle.txn.lock().await;
        if txn.is_some() {
            return Err(PersistenceError::Store(
                "session already has an open transaction".to_string(),
            ));
        }
        let guard = Arc::clone(&self.handle.state).lock_owned().await;
        let snapshot = guard.clone();
        *txn = Some(MemoryTxn {
            guard,
            snapshot: Some(snapshot),
        });
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), PersistenceError> {
        let Some(mut open) = self.handle.txn.lock().await.take() else {
            return Ok(());
        };
        if let Some(message) = self.faults.lock().await.commit.take() {
            drop(open);
            return Err(PersistenceError::Store(message));
        }
        open.snapshot = None;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), PersistenceError> {
        let open = self.handle.txn.lock().await.take();
        drop(open);
        Ok(())
    }

    async fn flush(&mut self) -> Result<usize, PersistenceError> {
        let count = self.accounts.changes.len() + self.transaction_logs.changes.len();
        if count == 0 {
            return Ok(0);
        }
        if let Some(message) = self.faults.lock().await.flush.take() {
            return Err(PersistenceError::Store(message));
        }

        let mut txn = self.handle.txn.lock().await;
        let outcome = match txn.as_mut() {
            Some(open) => apply_batch(
                &mut *open.guard,
                &self.accounts.changes,
                &self.transaction_logs.changes,
            ),
            None => {
                let mut state = self.handle.state.lock().await;
                apply_batch(
                    &mut *state,
                    &self.accounts.changes,
                    &self.transaction_logs.changes,
                )
            }
        };
        drop(txn);

        let (accounts, transaction_logs) = outcome?;
        self.accounts.changes.applied(accounts);
        self.transaction_logs.changes.applied(transaction_logs);
        Ok(count)
    }
}
