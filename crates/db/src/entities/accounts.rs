//! `SeaORM` Entity for accounts table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub account_type: String,
    pub account_number: String,
    /// Balance in minor units (cents).
    pub balance_cents: i64,
    pub version: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transaction_logs::Entity")]
    TransactionLogs,
}

impl Related<super::transaction_logs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TransactionLogs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
