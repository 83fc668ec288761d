//! Account rows: mapping, versioned writes and the owner query.

use async_trait::async_trait;
use coffer_core::ledger::{Account, PersistenceError};
use coffer_core::store::AccountRepository;
use coffer_shared::types::{AccountId, UserId};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, Set,
};

use super::{SeaRecord, SeaRepository, conflict, from_cents, store_error, to_cents};
use crate::entities::accounts;

#[async_trait]
impl SeaRecord for Account {
    type Table = accounts::Entity;

    const ID_COLUMN: accounts::Column = accounts::Column::Id;

    fn key(id: AccountId) -> i64 {
        id.into_inner()
    }

    fn from_model(model: accounts::Model) -> Self {
        Self {
            id: AccountId::new(model.id),
            user_id: UserId::new(model.user_id),
            account_type: model.account_type,
            account_number: model.account_number,
            current_balance: from_cents(model.balance_cents),
            created_at: model.created_at,
            updated_at: model.updated_at,
            version: model.version,
        }
    }

    async fn insert(txn: &DatabaseTransaction, entity: &Self) -> Result<Self, PersistenceError> {
        let model = accounts::ActiveModel {
            id: if entity.id.is_assigned() {
                Set(entity.id.into_inner())
            } else {
                NotSet
            },
            user_id: Set(entity.user_id.into_inner()),
            account_type: Set(entity.account_type.clone()),
            account_number: Set(entity.account_number.clone()),
            balance_cents: Set(to_cents(entity.current_balance)?),
            version: Set(1),
            created_at: Set(entity.created_at),
            updated_at: Set(entity.updated_at),
        }
        .insert(txn)
        .await
        .map_err(store_error)?;

        Ok(Self::from_model(model))
    }

    async fn replace(txn: &DatabaseTransaction, entity: &Self) -> Result<(), PersistenceError> {
        let result = accounts::Entity::update_many()
            .set(accounts::ActiveModel {
                id: NotSet,
                user_id: Set(entity.user_id.into_inner()),
                account_type: Set(entity.account_type.clone()),
                account_number: Set(entity.account_number.clone()),
                balance_cents: Set(to_cents(entity.current_balance)?),
                version: Set(entity.version + 1),
                created_at: Set(entity.created_at),
                updated_at: Set(entity.updated_at),
            })
            .filter(accounts::Column::Id.eq(entity.id.into_inner()))
            .filter(accounts::Column::Version.eq(entity.version))
            .exec(txn)
            .await
            .map_err(store_error)?;

        if result.rows_affected == 0 {
            return Err(conflict::<Self>(entity.id));
        }
        Ok(())
    }

    async fn delete(txn: &DatabaseTransaction, entity: &Self) -> Result<(), PersistenceError> {
        let result = accounts::Entity::delete_many()
            .filter(accounts::Column::Id.eq(entity.id.into_inner()))
            .filter(accounts::Column::Version.eq(entity.version))
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
impl AccountRepository for SeaRepository<Account> {
    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Account>, PersistenceError> {
        let select = accounts::Entity::find()
            .filter(accounts::Column::UserId.eq(user_id.into_inner()))
            .order_by_asc(accounts::Column::Id);
        let models = self.conn.all(select).await?;
        Ok(models.into_iter().map(Account::from_model).collect())
    }
}
