//! Repositories, sessions and the store backed by `SeaORM`.
//!
//! Reads run on the session's open transaction when there is one and on the
//! pool otherwise. Every flush writes its batch inside a transaction of its
//! own, nested as a savepoint when the session already has one open.

mod account;
mod session;
mod transaction_log;

use std::sync::Arc;

use async_trait::async_trait;
use coffer_core::ledger::PersistenceError;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use coffer_core::store::{ChangeSet, Entity, Repository, StagedWrite};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Select,
};
use tokio::sync::Mutex;

pub use session::{SeaSession, SeaStore};

pub(crate) fn store_error(err: DbErr) -> PersistenceError {
    PersistenceError::Store(err.to_string())
}

pub(crate) fn conflict<T: Entity>(id: T::Id) -> PersistenceError {
    PersistenceError::Conflict {
        entity: T::NAME,
        id: id.to_string(),
    }
}

/// Converts a money amount to the integer minor units stored in money columns.
pub(crate) fn to_cents(amount: Decimal) -> Result<i64, PersistenceError> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .filter(|cents| cents.fract().is_zero())
        .and_then(|cents| cents.to_i64())
        .ok_or_else(|| {
            PersistenceError::Store(format!("{amount} is not a whole number of cents"))
        })
}

pub(crate) fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Pool handle plus the slot for a session's open transaction.
#[derive(Debug, Clone)]
pub(crate) struct Connection {
    db: DatabaseConnection,
    txn: Arc<Mutex<Option<DatabaseTransaction>>>,
}

impl Connection {
    fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            txn: Arc::new(Mutex::new(None)),
        }
    }

    async fn one<E: EntityTrait>(
        &self,
        select: Select<E>,
    ) -> Result<Option<E::Model>, PersistenceError> {
        let txn = self.txn.lock().await;
        let result = match txn.as_ref() {
            Some(txn) => select.one(txn).await,
            None => select.one(&self.db).await,
        };
        result.map_err(store_error)
    }

    async fn all<E: EntityTrait>(
        &self,
        select: Select<E>,
    ) -> Result<Vec<E::Model>, PersistenceError> {
        let txn = self.txn.lock().await;
        let result = match txn.as_ref() {
            Some(txn) => select.all(txn).await,
            None => select.all(&self.db).await,
        };
        result.map_err(store_error)
    }
}

/// Entities with a table in the database.
#[async_trait]
pub trait SeaRecord: Entity {
    /// `SeaORM` entity for the table.
    type Table: EntityTrait;

    /// Primary key column.
    const ID_COLUMN: <Self::Table as EntityTrait>::Column;

    /// Raw primary key value.
    fn key(id: Self::Id) -> i64;

    /// Builds the domain entity from a row.
    fn from_model(model: <Self::Table as EntityTrait>::Model) -> Self;

    /// Inserts a row and returns the entity as stored.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Store` if the insert fails.
    async fn insert(txn: &DatabaseTransaction, entity: &Self) -> Result<Self, PersistenceError>;

    /// Replaces the stored row.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Conflict` if no row matched.
    async fn replace(txn: &DatabaseTransaction, entity: &Self) -> Result<(), PersistenceError>;

    /// Deletes the stored row.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Conflict` if no row matched.
    async fn delete(txn: &DatabaseTransaction, entity: &Self) -> Result<(), PersistenceError>;
}

/// Staged repository over one table.
#[derive(Debug)]
pub struct SeaRepository<T> {
    conn: Connection,
    changes: ChangeSet<T>,
}

impl<T> SeaRepository<T> {
    pub(crate) fn new(conn: Connection) -> Self {
        Self {
            conn,
            changes: ChangeSet::new(),
        }
    }
}

#[async_trait]
impl<T: SeaRecord> Repository<T> for SeaRepository<T> {
    async fn get_by_id(&self, id: T::Id) -> Result<Option<T>, PersistenceError> {
        let select = T::Table::find().filter(T::ID_COLUMN.eq(T::key(id)));
        Ok(self.conn.one(select).await?.map(T::from_model))
    }

    async fn get_all(&self) -> Result<Vec<T>, PersistenceError> {
        let select = T::Table::find().order_by_asc(T::ID_COLUMN);
        let models = self.conn.all(select).await?;
        Ok(models.into_iter().map(T::from_model).collect())
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

/// Applies staged writes in order and returns the inserted entities.
async fn apply<'a, T, I>(txn: &DatabaseTransaction, writes: I) -> Result<Vec<T>, PersistenceError>
where
    T: SeaRecord,
    I: IntoIterator<Item = &'a StagedWrite<T>>,
{
    let mut inserted = Vec::new();
    for write in writes {
        match write {
            StagedWrite::Add(entity) => inserted.push(T::insert(txn, entity).await?),
            StagedWrite::Update(entity) => T::replace(txn, entity).await?,
            StagedWrite::Remove(entity) => T::delete(txn, entity).await?,
        }
    }
    Ok(inserted)
}
