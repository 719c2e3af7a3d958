//! In-memory ledger store.
//!
//! A unit of work holds the whole store behind an async mutex, which makes
//! every trade serializable. Changes are applied in place and recorded in an
//! undo log that is replayed backwards on rollback or when the unit is
//! dropped without a commit.
//!
//! The store counts its reads and units and can inject faults, which makes it
//! the instrumented stand-in for PostgreSQL in tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;

use super::error::LedgerError;
use super::store::{LedgerStore, TradeUnit};
use super::types::{Account, LedgerEntry, RecordedTrade};

/// Failures the store can be told to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// `append_entries` returns a database error.
    FailAppend,
    /// `append_entries` panics.
    PanicOnAppend,
    /// `append_entries` never completes.
    StallOnAppend,
    /// `adjust_balance` reports zero rows affected.
    ZeroRowsOnAdjust,
    /// `find_account` and `ping` return a database error.
    FailRead,
}

#[derive(Debug, Default)]
struct State {
    accounts: BTreeMap<String, i64>,
    entries: Vec<LedgerEntry>,
    trade_keys: HashMap<String, RecordedTrade>,
}

#[derive(Debug, Default)]
struct Instruments {
    reads: AtomicUsize,
    units: AtomicUsize,
    fault: Mutex<Option<Fault>>,
}

impl Instruments {
    fn fault(&self) -> Option<Fault> {
        *self.fault.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-memory implementation of [`LedgerStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<tokio::sync::Mutex<State>>,
    instruments: Arc<Instruments>,
    read_delay: Option<Duration>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every `find_account` by `delay`.
    #[must_use]
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Creates or overwrites an account.
    ///
    /// # Panics
    ///
    /// Panics if called while a unit of work is open.
    pub fn seed(&self, account_id: &str, balance: i64) {
        self.state
            .try_lock()
            .expect("seed while a unit of work is open")
            .accounts
            .insert(account_id.to_string(), balance);
    }

    /// Arms a fault for the lifetime of the store.
    pub fn inject(&self, fault: Fault) {
        *self
            .instruments
            .fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(fault);
    }

    /// Number of `find_account` calls so far.
    #[must_use]
    pub fn reads(&self) -> usize {
        self.instruments.reads.load(Ordering::SeqCst)
    }

    /// Number of units of work begun so far.
    #[must_use]
    pub fn units_begun(&self) -> usize {
        self.instruments.units.load(Ordering::SeqCst)
    }

    /// Total store accesses of any kind.
    #[must_use]
    pub fn accesses(&self) -> usize {
        self.reads() + self.units_begun()
    }

    /// Committed balance of an account.
    ///
    /// # Panics
    ///
    /// Panics if called while a unit of work is open.
    #[must_use]
    pub fn balance(&self, account_id: &str) -> Option<i64> {
        self.snapshot().accounts.get(account_id).copied()
    }

    /// Committed journal entries in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if called while a unit of work is open.
    #[must_use]
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.snapshot().entries.clone()
    }

    fn snapshot(&self) -> tokio::sync::MutexGuard<'_, State> {
        self.state
            .try_lock()
            .expect("inspect while a unit of work is open")
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn find_account(&self, account_id: &str) -> Result<Option<Account>, LedgerError> {
        self.instruments.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        if self.instruments.fault() == Some(Fault::FailRead) {
            return Err(LedgerError::Database("injected read failure".to_string()));
        }

        let state = self.state.lock().await;
        Ok(state.accounts.get(account_id).map(|balance| Account {
            account_id: account_id.to_string(),
            balance: *balance,
        }))
    }

    async fn ping(&self) -> Result<(), LedgerError> {
        if self.instruments.fault() == Some(Fault::FailRead) {
            return Err(LedgerError::Database("injected read failure".to_string()));
        }
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn TradeUnit>, LedgerError> {
        self.instruments.units.fetch_add(1, Ordering::SeqCst);
        let guard = Arc::clone(&self.state).lock_owned().await;
        Ok(Box::new(MemoryUnit {
            state: guard,
            undo: Vec::new(),
            instruments: Arc::clone(&self.instruments),
            finished: false,
        }))
    }
}

enum Undo {
    Balance { account_id: String, delta: i64 },
    Entries(usize),
    TradeKey(String),
}

struct MemoryUnit {
    state: OwnedMutexGuard<State>,
    undo: Vec<Undo>,
    instruments: Arc<Instruments>,
    finished: bool,
}

impl MemoryUnit {
    fn revert(&mut self) {
        while let Some(step) = self.undo.pop() {
            match step {
                Undo::Balance { account_id, delta } => {
                    if let Some(balance) = self.state.accounts.get_mut(&account_id) {
                        *balance -= delta;
                    }
                }
                Undo::Entries(count) => {
                    let keep = self.state.entries.len().saturating_sub(count);
                    self.state.entries.truncate(keep);
                }
                Undo::TradeKey(key) => {
                    self.state.trade_keys.remove(&key);
                }
            }
        }
    }
}

#[async_trait]
impl TradeUnit for MemoryUnit {
    async fn lock_balance(&mut self, account_id: &str) -> Result<Option<i64>, LedgerError> {
        Ok(self.state.accounts.get(account_id).copied())
    }

    async fn adjust_balance(&mut self, account_id: &str, delta: i64) -> Result<u64, LedgerError> {
        if self.instruments.fault() == Some(Fault::ZeroRowsOnAdjust) {
            return Ok(0);
        }
        let Some(balance) = self.state.accounts.get_mut(account_id) else {
            return Ok(0);
        };
        let updated = balance
            .checked_add(delta)
            .ok_or_else(|| LedgerError::Database(format!("balance out of range for {account_id}")))?;
        if updated < 0 {
            return Err(LedgerError::Database(format!(
                "balance of {account_id} would become negative"
            )));
        }
        *balance = updated;
        self.undo.push(Undo::Balance {
            account_id: account_id.to_string(),
            delta,
        });
        Ok(1)
    }

    async fn append_entries(&mut self, entries: &[LedgerEntry]) -> Result<(), LedgerError> {
        match self.instruments.fault() {
            Some(Fault::FailAppend) => {
                return Err(LedgerError::Database("injected append failure".to_string()));
            }
            Some(Fault::PanicOnAppend) => panic!("injected append panic"),
            Some(Fault::StallOnAppend) => std::future::pending::<()>().await,
            _ => {}
        }
        self.state.entries.extend_from_slice(entries);
        self.undo.push(Undo::Entries(entries.len()));
        Ok(())
    }

    async fn find_trade_key(&mut self, key: &str) -> Result<Option<RecordedTrade>, LedgerError> {
        Ok(self.state.trade_keys.get(key).cloned())
    }

    async fn record_trade_key(
        &mut self,
        key: &str,
        trade: &RecordedTrade,
        _timestamp_ms: i64,
    ) -> Result<(), LedgerError> {
        if self.state.trade_keys.contains_key(key) {
            return Err(LedgerError::Database(format!("duplicate idempotency key {key}")));
        }
        self.state.trade_keys.insert(key.to_string(), trade.clone());
        self.undo.push(Undo::TradeKey(key.to_string()));
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), LedgerError> {
        self.undo.clear();
        self.finished = true;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), LedgerError> {
        self.revert();
        self.finished = true;
        Ok(())
    }
}

impl Drop for MemoryUnit {
    fn drop(&mut self) {
        if !self.finished {
            self.revert();
        }
    }
}
