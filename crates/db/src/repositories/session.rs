//! Database session and store.

use async_trait::async_trait;
use coffer_core::ledger::{Account, PersistenceError, TransactionLog};
use coffer_core::store::{ChangeSet, Session, Store};
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use tracing::warn;

use super::{Connection, SeaRepository, apply, store_error};

/// Session factory over a connection pool.
#[derive(Debug, Clone)]
pub struct SeaStore {
    db: DatabaseConnection,
}

impl SeaStore {
    /// Wraps an established connection.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl Store for SeaStore {
    type Session = SeaSession;

    fn open_session(&self) -> SeaSession {
        SeaSession::new(self.db.clone())
    }
}

/// One logical connection with its account and transaction log repositories.
#[derive(Debug)]
pub struct SeaSession {
    conn: Connection,
    accounts: SeaRepository<Account>,
    transaction_logs: SeaRepository<TransactionLog>,
}

impl SeaSession {
    fn new(db: DatabaseConnection) -> Self {
        let conn = Connection::new(db);
        Self {
            accounts: SeaRepository::new(conn.clone()),
            transaction_logs: SeaRepository::new(conn.clone()),
            conn,
        }
    }
}

async fn write_batch(
    txn: &DatabaseTransaction,
    accounts: &ChangeSet<Account>,
    transaction_logs: &ChangeSet<TransactionLog>,
) -> Result<(Vec<Account>, Vec<TransactionLog>), PersistenceError> {
    let inserted_accounts = apply(txn, accounts.upserts()).await?;
    let inserted_logs = apply(txn, transaction_logs.staged()).await?;
    apply(txn, accounts.removals()).await?;
    Ok((inserted_accounts, inserted_logs))
}

#[async_trait]
impl Session for SeaSession {
    type Accounts = SeaRepository<Account>;
    type TransactionLogs = SeaRepository<TransactionLog>;

    fn accounts(&self) -> &SeaRepository<Account> {
        &self.accounts
    }

    fn accounts_mut(&mut self) -> &mut SeaRepository<Account> {
        &mut self.accounts
    }

    fn transaction_logs(&self) -> &SeaRepository<TransactionLog> {
        &self.transaction_logs
    }

    fn transaction_logs_mut(&mut self) -> &mut SeaRepository<TransactionLog> {
        &mut self.transaction_logs
    }

    async fn begin(&mut self) -> Result<(), PersistenceError> {
        let mut slot = self.conn.txn.lock().await;
        if slot.is_some() {
            return Err(PersistenceError::Store(
                "session already has an open transaction".to_string(),
            ));
        }
        *slot = Some(self.conn.db.begin().await.map_err(store_error)?);
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), PersistenceError> {
        let Some(txn) = self.conn.txn.lock().await.take() else {
            return Ok(());
        };
        txn.commit().await.map_err(store_error)
    }

    async fn rollback(&mut self) -> Result<(), PersistenceError> {
        let Some(txn) = self.conn.txn.lock().await.take() else {
            return Ok(());
        };
        txn.rollback().await.map_err(store_error)
    }

    async fn flush(&mut self) -> Result<usize, PersistenceError> {
        let count = self.accounts.changes.len() + self.transaction_logs.changes.len();
        if count == 0 {
            return Ok(0);
        }

        let slot = self.conn.txn.lock().await;
        let batch = match slot.as_ref() {
            Some(open) => open.begin().await,
            None => self.conn.db.begin().await,
        }
        .map_err(store_error)?;

        let outcome = write_batch(
            &batch,
            &self.accounts.changes,
            &self.transaction_logs.changes,
        )
        .await;
        let (accounts, transaction_logs) = match outcome {
            Ok(inserted) => {
                batch.commit().await.map_err(store_error)?;
                inserted
            }
            Err(err) => {
                if let Err(rollback_err) = batch.rollback().await {
                    warn!(error = %rollback_err, "Failed to roll back write batch");
                }
                return Err(err);
            }
        };
        drop(slot);

        self.accounts.changes.applied(accounts);
        self.transaction_logs.changes.applied(transaction_logs);
        Ok(count)
    }
}
