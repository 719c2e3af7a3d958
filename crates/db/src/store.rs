//! PostgreSQL-backed ledger store.
//!
//! Units of work are `READ COMMITTED` transactions. Serialization per
//! account comes from `SELECT ... FOR UPDATE` row locks, held until the
//! transaction ends, and balances are changed with relative updates so a
//! unit never writes back a stale value.

use async_trait::async_trait;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    AccessMode, ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityTrait, IsolationLevel, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use tracing::debug;

use wallet_core::ledger::{
    Account, LedgerEntry, LedgerError, LedgerStore, RecordedTrade, TradeUnit,
};

use crate::entities::{account, ledger_entry, trade_key};

fn db_error(err: DbErr) -> LedgerError {
    LedgerError::Database(err.to_string())
}

/// [`LedgerStore`] over a `SeaORM` connection pool.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    db: DatabaseConnection,
}

impl PgLedgerStore {
    /// Creates a new store.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates an account, or resets its balance if it already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database upsert fails.
    pub async fn upsert_account(&self, account_id: &str, balance: i64) -> Result<(), DbErr> {
        let model = account::ActiveModel {
            account_id: Set(account_id.to_string()),
            balance: Set(balance),
            ..Default::default()
        };
        account::Entity::insert(model)
            .on_conflict(
                OnConflict::column(account::Column::AccountId)
                    .update_column(account::Column::Balance)
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    /// Journal entries of one trade, decrease first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row has an unknown direction.
    pub async fn entries_for_trade(&self, trade_id: &str) -> Result<Vec<LedgerEntry>, DbErr> {
        ledger_entry::Entity::find()
            .filter(ledger_entry::Column::TradeId.eq(trade_id))
            .order_by_desc(ledger_entry::Column::Direction)
            .all(&self.db)
            .await?
            .into_iter()
            .map(LedgerEntry::try_from)
            .collect()
    }

    /// Journal entries of one account, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row has an unknown direction.
    pub async fn entries_for_account(&self, account_id: &str) -> Result<Vec<LedgerEntry>, DbErr> {
        ledger_entry::Entity::find()
            .filter(ledger_entry::Column::AccountId.eq(account_id))
            .order_by_asc(ledger_entry::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(LedgerEntry::try_from)
            .collect()
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn find_account(&self, account_id: &str) -> Result<Option<Account>, LedgerError> {
        account::Entity::find()
            .filter(account::Column::AccountId.eq(account_id))
            .one(&self.db)
            .await
            .map(|found| found.map(Account::from))
            .map_err(db_error)
    }

    async fn ping(&self) -> Result<(), LedgerError> {
        self.db.ping().await.map_err(db_error)
    }

    async fn begin(&self) -> Result<Box<dyn TradeUnit>, LedgerError> {
        let txn = self
            .db
            .begin_with_config(
                Some(IsolationLevel::ReadCommitted),
                Some(AccessMode::ReadWrite),
            )
            .await
            .map_err(db_error)?;
        Ok(Box::new(PgTradeUnit { txn }))
    }
}

/// A trade unit backed by an open database transaction.
///
/// Dropping it without a commit rolls the transaction back.
struct PgTradeUnit {
    txn: DatabaseTransaction,
}

#[async_trait]
impl TradeUnit for PgTradeUnit {
    async fn lock_balance(&mut self, account_id: &str) -> Result<Option<i64>, LedgerError> {
        let row = account::Entity::find()
            .filter(account::Column::AccountId.eq(account_id))
            .lock_exclusive()
            .one(&self.txn)
            .await
            .map_err(db_error)?;
        Ok(row.map(|r| r.balance))
    }

    async fn adjust_balance(&mut self, account_id: &str, delta: i64) -> Result<u64, LedgerError> {
        let result = account::Entity::update_many()
            .col_expr(
                account::Column::Balance,
                Expr::col(account::Column::Balance).add(delta),
            )
            .filter(account::Column::AccountId.eq(account_id))
            .exec(&self.txn)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected)
    }

    async fn append_entries(&mut self, entries: &[LedgerEntry]) -> Result<(), LedgerError> {
        if entries.is_empty() {
            return Ok(());
        }
        ledger_entry::Entity::insert_many(entries.iter().map(ledger_entry::ActiveModel::from_entry))
            .exec_without_returning(&self.txn)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn find_trade_key(&mut self, key: &str) -> Result<Option<RecordedTrade>, LedgerError> {
        let row = trade_key::Entity::find_by_id(key.to_string())
            .one(&self.txn)
            .await
            .map_err(db_error)?;
        Ok(row.map(RecordedTrade::from))
    }

    async fn record_trade_key(
        &mut self,
        key: &str,
        trade: &RecordedTrade,
        timestamp_ms: i64,
    ) -> Result<(), LedgerError> {
        let model = trade_key::ActiveModel {
            idempotency_key: Set(key.to_string()),
            trade_id: Set(trade.trade_id.clone()),
            from_account_id: Set(trade.from_account_id.clone()),
            to_account_id: Set(trade.to_account_id.clone()),
            amount: Set(trade.amount),
            timestamp_ms: Set(timestamp_ms),
        };
        trade_key::Entity::insert(model)
            .exec_without_returning(&self.txn)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        self.txn.commit().await.map_err(db_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        debug!("rolling back ledger transaction");
        self.txn.rollback().await.map_err(db_error)
    }
}
