//! `SeaORM` Entity for ledger_entry table.

use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use wallet_core::ledger::{Direction, LedgerEntry};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "ledger_entry")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub account_id: String,
    /// 1 = increase, 2 = decrease.
    pub direction: i16,
    pub amount: i64,
    pub timestamp_ms: i64,
    pub trade_id: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    /// Builds an insertable row from a journal entry.
    #[must_use]
    pub fn from_entry(entry: &LedgerEntry) -> Self {
        Self {
            id: NotSet,
            account_id: Set(entry.account_id.clone()),
            direction: Set(entry.direction.as_i16()),
            amount: Set(entry.amount),
            timestamp_ms: Set(entry.timestamp_ms),
            trade_id: Set(entry.trade_id.clone()),
        }
    }
}

impl TryFrom<Model> for LedgerEntry {
    type Error = DbErr;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let direction = Direction::from_i16(model.direction).ok_or_else(|| {
            DbErr::Type(format!(
                "unknown direction {} on ledger entry {}",
                model.direction, model.id
            ))
        })?;
        Ok(Self {
            account_id: model.account_id,
            direction,
            amount: model.amount,
            timestamp_ms: model.timestamp_ms,
            trade_id: model.trade_id,
        })
    }
}
