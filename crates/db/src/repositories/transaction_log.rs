//! Transaction log rows and the per-account queries.

use async_trait::async_trait;
use coffer_core::ledger::{PersistenceError, TransactionLog};
use coffer_core::store::TransactionLogRepository;
use coffer_shared::types::{AccountId, TransactionLogId};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, Set,
};

use super::{SeaRecord, SeaRepository, conflict, from_cents, store_error, to_cents};
use crate::entities::transaction_logs;

fn active_model(
    entity: &TransactionLog,
) -> Result<transaction_logs::ActiveModel, PersistenceError> {
    Ok(transaction_logs::ActiveModel {
        id: NotSet,
        account_id: Set(entity.account_id.into_inner()),
        transaction_type: Set(entity.transaction_type.clone()),
        amount_cents: Set(to_cents(entity.amount)?),
        status: Set(entity.status.clone()),
        timestamp: Set(entity.timestamp),
        details: Set(entity.details.clone()),
    })
}

#[async_trait]
impl SeaRecord for TransactionLog {
    type Table = transaction_logs::Entity;

    const ID_COLUMN: transaction_logs::Column = transaction_logs::Column::Id;

    fn key(id: TransactionLogId) -> i64 {
        id.into_inner()
    }

    fn from_model(model: transaction_logs::Model) -> Self {
        Self {
            id: TransactionLogId::new(model.id),
            account_id: AccountId::new(model.account_id),
            transaction_type: model.transaction_type,
            amount: from_cents(model.amount_cents),
            status: model.status,
            timestamp: model.timestamp,
            details: model.details,
        }
    }

    async fn insert(txn: &DatabaseTransaction, entity: &Self) -> Result<Self, PersistenceError> {
        let mut model = active_model(entity)?;
        if entity.id.is_assigned() {
            model.id = Set(entity.id.into_inner());
        }
        let model = model.insert(txn).await.map_err(store_error)?;
        Ok(Self::from_model(model))
    }

    async fn replace(txn: &DatabaseTransaction, entity: &Self) -> Result<(), PersistenceError> {
        let result = transaction_logs::Entity::update_many()
            .set(active_model(entity)?)
            .filter(transaction_logs::Column::Id.eq(entity.id.into_inner()))
            .exec(txn)
            .await
            .map_err(store_error)?;

        if result.rows_affected == 0 {
            return Err(conflict::<Self>(entity.id));
        }
        Ok(())
    }

    async fn delete(txn: &DatabaseTransaction, entity: &Self) -> Result<(), PersistenceError> {
        let result = transaction_logs::Entity::delete_by_id(entity.id.into_inner())
            .exec(txn)
            .await
            .map_err(store_error)?;

        if result.rows_affected == 0 {
            return Err(conflict::<Self>(entity.id));
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionLogRepository for SeaRepository<TransactionLog> {
    async fn find_by_accounts(
        &self,
        account_ids: &[AccountId],
    ) -> Result<Vec<TransactionLog>, PersistenceError> {
        if account_ids.is_empty() {
            return Ok(Vec::new());
        }
        let select = transaction_logs::Entity::find()
            .filter(
                transaction_logs::Column::AccountId
                    .is_in(account_ids.iter().map(|id| id.into_inner())),
            )
            .order_by_asc(transaction_logs::Column::Id);
        let models = self.conn.all(select).await?;
        Ok(models.into_iter().map(TransactionLog::from_model).collect())
    }

    async fn find_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<TransactionLog>, PersistenceError> {
        let select = transaction_logs::Entity::find()
            .filter(transaction_logs::Column::AccountId.eq(account_id.into_inner()))
            .order_by_desc(transaction_logs::Column::Timestamp)
            .order_by_desc(transaction_logs::Column::Id);
        let models = self.conn.all(select).await?;
        Ok(models.into_iter().map(TransactionLog::from_model).collect())
    }
}
