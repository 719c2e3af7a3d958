//! `SeaORM` Entity for trade_key table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use wallet_core::ledger::RecordedTrade;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "trade_key")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub idempotency_key: String,
    pub trade_id: String,
    pub from_account_id: String,
    pub to_account_id: String,
    pub amount: i64,
    pub timestamp_ms: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for RecordedTrade {
    fn from(model: Model) -> Self {
        Self {
            trade_id: model.trade_id,
            from_account_id: model.from_account_id,
            to_account_id: model.to_account_id,
            amount: model.amount,
        }
    }
}
