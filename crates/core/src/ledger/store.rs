//! Storage seam between the ledger engine and a backing store.
//!
//! A store hands out [`TradeUnit`]s: all-or-nothing units of work. Row
//! locks taken through [`TradeUnit::lock_balance`] must be held until the
//! unit commits or rolls back, and a unit dropped without `commit` must leave
//! no trace.

use async_trait::async_trait;

use super::error::LedgerError;
use super::types::{Account, LedgerEntry, RecordedTrade};

/// A backing store for accounts and the journal.
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    /// Point lookup of an account outside any unit of work.
    async fn find_account(&self, account_id: &str) -> Result<Option<Account>, LedgerError>;

    /// Checks that the store is reachable.
    async fn ping(&self) -> Result<(), LedgerError>;

    /// Opens a new unit of work.
    async fn begin(&self) -> Result<Box<dyn TradeUnit>, LedgerError>;
}

/// An open atomic unit of work.
#[async_trait]
pub trait TradeUnit: Send {
    /// Locks the account row for the rest of the unit and returns its balance,
    /// or `None` if the account does not exist.
    async fn lock_balance(&mut self, account_id: &str) -> Result<Option<i64>, LedgerError>;

    /// Applies `balance += delta` and returns the number of rows affected.
    async fn adjust_balance(&mut self, account_id: &str, delta: i64) -> Result<u64, LedgerError>;

    /// Appends journal entries.
    async fn append_entries(&mut self, entries: &[LedgerEntry]) -> Result<(), LedgerError>;

    /// Returns the trade already recorded under an idempotency key.
    async fn find_trade_key(&mut self, key: &str) -> Result<Option<RecordedTrade>, LedgerError>;

    /// Records the trade produced under an idempotency key.
    async fn record_trade_key(
        &mut self,
        key: &str,
        trade: &RecordedTrade,
        timestamp_ms: i64,
    ) -> Result<(), LedgerError>;

    /// Makes every change of the unit visible.
    async fn commit(self: Box<Self>) -> Result<(), LedgerError>;

    /// Discards every change of the unit.
    async fn rollback(self: Box<Self>) -> Result<(), LedgerError>;
}
