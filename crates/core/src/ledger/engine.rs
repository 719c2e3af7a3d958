//! The ledger engine: validated, atomic, double-entry trades.
//!
//! A trade runs as a single unit of work:
//!
//! 1. Lock both account rows in ascending id order
//! 2. Replay the recorded trade if the idempotency key was seen before with
//!    the same dealing; refuse the key if it was used for another one
//! 3. Check the source balance under lock
//! 4. Debit the source and credit the destination, one row each
//! 5. Append the decrease/increase journal pair
//! 6. Record the idempotency key, then commit
//!
//! Locking both rows before reading makes the balance check and the debit
//! indivisible with respect to any other trade on the same accounts, and the
//! fixed lock order keeps opposite-direction transfers from deadlocking.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::error::LedgerError;
use super::store::{LedgerStore, TradeUnit};
use super::types::{Account, Dealing, RecordedTrade, journal_pair};
use super::unit::within_unit;
use super::validation::validate_dealing;
use crate::coalesce::Coalescer;

/// The surface the wallet verbs consume.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Bank: Send + Sync {
    /// Executes a dealing and returns the trade id.
    async fn trade(&self, dealing: &Dealing) -> Result<String, LedgerError>;

    /// Reads an account.
    async fn get_account(&self, account_id: &str) -> Result<Account, LedgerError>;

    /// Checks that the backing store is reachable.
    async fn ping(&self) -> Result<(), LedgerError>;
}

/// Ledger engine over a backing store.
pub struct Ledger<S> {
    store: Arc<S>,
    reads: Coalescer<String, Account, LedgerError>,
    trade_timeout: Option<Duration>,
}

impl<S: LedgerStore> Ledger<S> {
    /// Creates an engine without a trade deadline.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            reads: Coalescer::new(),
            trade_timeout: None,
        }
    }

    /// Sets the deadline applied to every trade's unit of work.
    #[must_use]
    pub fn with_trade_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.trade_timeout = timeout;
        self
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Executes a dealing; see [`Ledger::trade_with_cancel`].
    pub async fn trade(&self, dealing: &Dealing) -> Result<String, LedgerError> {
        self.trade_with_cancel(dealing, &CancellationToken::new())
            .await
    }

    /// Executes a dealing, aborting and rolling back if `cancel` fires first.
    ///
    /// Malformed dealings are rejected before the store is touched. On
    /// success exactly two balances move and two entries are written; on any
    /// failure nothing is.
    ///
    /// # Errors
    ///
    /// `SelfTransfer`, `NegativeAmount`, `IdempotencyKeyReused`,
    /// `AccountNotFound`, `InsufficientFunds`, `UnexpectedRowsAffected`,
    /// `Database` or `Aborted`.
    pub async fn trade_with_cancel(
        &self,
        dealing: &Dealing,
        cancel: &CancellationToken,
    ) -> Result<String, LedgerError> {
        if let Err(err) = validate_dealing(dealing) {
            warn!(
                from = %dealing.from_account_id,
                to = %dealing.to_account_id,
                amount = dealing.amount,
                error = %err,
                "rejected malformed dealing"
            );
            return Err(err);
        }

        let owned = dealing.clone();
        let result = within_unit(self.store.as_ref(), cancel, self.trade_timeout, move |unit| {
            Box::pin(execute(unit, owned))
        })
        .await;

        match &result {
            Ok(trade_id) => info!(
                trade_id = %trade_id,
                from = %dealing.from_account_id,
                to = %dealing.to_account_id,
                amount = dealing.amount,
                "trade committed"
            ),
            Err(err) if err.is_client_error() => warn!(
                from = %dealing.from_account_id,
                to = %dealing.to_account_id,
                amount = dealing.amount,
                error = %err,
                "trade refused"
            ),
            Err(err) => error!(
                from = %dealing.from_account_id,
                to = %dealing.to_account_id,
                amount = dealing.amount,
                error = %err,
                "trade failed"
            ),
        }
        result
    }

    /// Reads an account, sharing the lookup with concurrent callers.
    ///
    /// # Errors
    ///
    /// `AccountNotFound` or `Database`.
    pub async fn get_account(&self, account_id: &str) -> Result<Account, LedgerError> {
        let store = Arc::clone(&self.store);
        let key = account_id.to_string();
        self.reads
            .run(account_id.to_string(), move || async move {
                store
                    .find_account(&key)
                    .await
                    .and_then(|found| found.ok_or_else(|| LedgerError::AccountNotFound(key)))
            })
            .await
    }
}

#[async_trait]
impl<S: LedgerStore> Bank for Ledger<S> {
    async fn trade(&self, dealing: &Dealing) -> Result<String, LedgerError> {
        Ledger::trade(self, dealing).await
    }

    async fn get_account(&self, account_id: &str) -> Result<Account, LedgerError> {
        Ledger::get_account(self, account_id).await
    }

    async fn ping(&self) -> Result<(), LedgerError> {
        self.store.ping().await
    }
}

async fn execute(unit: &mut dyn TradeUnit, dealing: Dealing) -> Result<String, LedgerError> {
    let trade_id = Uuid::new_v4().to_string();
    let timestamp_ms = Utc::now().timestamp_millis();

    let source_balance = lock_pair(unit, &dealing).await?;

    if let Some(key) = &dealing.idempotency_key {
        if let Some(recorded) = unit.find_trade_key(key).await? {
            if !recorded.matches(&dealing) {
                return Err(LedgerError::IdempotencyKeyReused(key.clone()));
            }
            debug!(idempotency_key = %key, trade_id = %recorded.trade_id, "replaying recorded trade");
            return Ok(recorded.trade_id);
        }
    }

    if source_balance < dealing.amount {
        return Err(LedgerError::InsufficientFunds {
            account_id: dealing.from_account_id,
            balance: source_balance,
            requested: dealing.amount,
        });
    }

    let debited = unit
        .adjust_balance(&dealing.from_account_id, -dealing.amount)
        .await?;
    expect_single_row(&dealing.from_account_id, debited)?;

    let credited = unit
        .adjust_balance(&dealing.to_account_id, dealing.amount)
        .await?;
    expect_single_row(&dealing.to_account_id, credited)?;

    unit.append_entries(&journal_pair(&dealing, &trade_id, timestamp_ms))
        .await?;

    if let Some(key) = &dealing.idempotency_key {
        unit.record_trade_key(key, &RecordedTrade::new(&dealing, &trade_id), timestamp_ms)
            .await?;
    }

    Ok(trade_id)
}

/// Locks source and destination in ascending id order; returns the source balance.
async fn lock_pair(unit: &mut dyn TradeUnit, dealing: &Dealing) -> Result<i64, LedgerError> {
    let from = dealing.from_account_id.as_str();
    let to = dealing.to_account_id.as_str();
    let (first, second) = if from < to { (from, to) } else { (to, from) };

    let first_balance = unit
        .lock_balance(first)
        .await?
        .ok_or_else(|| LedgerError::AccountNotFound(first.to_string()))?;
    let second_balance = unit
        .lock_balance(second)
        .await?
        .ok_or_else(|| LedgerError::AccountNotFound(second.to_string()))?;

    Ok(if first == from {
        first_balance
    } else {
        second_balance
    })
}

fn expect_single_row(account_id: &str, affected: u64) -> Result<(), LedgerError> {
    if affected == 1 {
        Ok(())
    } else {
        Err(LedgerError::UnexpectedRowsAffected {
            account_id: account_id.to_string(),
            affected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::memory::{Fault, MemoryStore};
    use crate::ledger::types::{Direction, PSEUDO_ACCOUNT, PSEUDO_ACCOUNT_FLOAT};
    use futures::future::join_all;

    fn ledger_with(accounts: &[(&str, i64)]) -> Ledger<MemoryStore> {
        let store = MemoryStore::new();
        for (id, balance) in accounts {
            store.seed(id, *balance);
        }
        Ledger::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_transfer_moves_money_and_journals_pair() {
        let ledger = ledger_with(&[("A", 1000), ("B", 1000)]);

        let trade_id = ledger.trade(&Dealing::new("A", "B", 300)).await.unwrap();

        let store = ledger.store();
        assert_eq!(store.balance("A"), Some(700));
        assert_eq!(store.balance("B"), Some(1300));

        let entries = store.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].account_id, "A");
        assert_eq!(entries[0].direction, Direction::Decrease);
        assert_eq!(entries[0].amount, 300);
        assert_eq!(entries[1].account_id, "B");
        assert_eq!(entries[1].direction, Direction::Increase);
        assert_eq!(entries[1].amount, 300);
        assert!(entries.iter().all(|e| e.trade_id == trade_id));
        assert_eq!(entries[0].timestamp_ms, entries[1].timestamp_ms);
    }

    #[tokio::test]
    async fn test_insufficient_funds_changes_nothing() {
        let ledger = ledger_with(&[("A", 100), (PSEUDO_ACCOUNT, PSEUDO_ACCOUNT_FLOAT)]);

        let result = ledger.trade(&Dealing::new("A", PSEUDO_ACCOUNT, 500)).await;

        assert_eq!(
            result,
            Err(LedgerError::InsufficientFunds {
                account_id: "A".to_string(),
                balance: 100,
                requested: 500,
            })
        );
        assert_eq!(ledger.store().balance("A"), Some(100));
        assert_eq!(ledger.store().balance(PSEUDO_ACCOUNT), Some(PSEUDO_ACCOUNT_FLOAT));
        assert!(ledger.store().entries().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_dealing_never_reaches_store() {
        let ledger = ledger_with(&[("A", 100)]);

        let self_transfer = ledger.trade(&Dealing::new("A", "A", 50)).await;
        let negative = ledger.trade(&Dealing::new("A", "B", -1)).await;

        assert_eq!(self_transfer, Err(LedgerError::SelfTransfer("A".to_string())));
        assert_eq!(negative, Err(LedgerError::NegativeAmount(-1)));
        assert_eq!(ledger.store().accesses(), 0);
    }

    #[tokio::test]
    async fn test_missing_account_is_not_found() {
        let ledger = ledger_with(&[("A", 100)]);

        let missing_destination = ledger.trade(&Dealing::new("A", "Z", 10)).await;
        let missing_source = ledger.trade(&Dealing::new("0", "A", 10)).await;

        assert_eq!(
            missing_destination,
            Err(LedgerError::AccountNotFound("Z".to_string()))
        );
        assert_eq!(
            missing_source,
            Err(LedgerError::AccountNotFound("0".to_string()))
        );
        assert_eq!(ledger.store().balance("A"), Some(100));
    }

    #[tokio::test]
    async fn test_unexpected_row_count_rolls_back() {
        let ledger = ledger_with(&[("A", 100), ("B", 0)]);
        ledger.store().inject(Fault::ZeroRowsOnAdjust);

        let result = ledger.trade(&Dealing::new("A", "B", 10)).await;

        assert_eq!(
            result,
            Err(LedgerError::UnexpectedRowsAffected {
                account_id: "A".to_string(),
                affected: 0,
            })
        );
        assert_eq!(ledger.store().balance("A"), Some(100));
        assert!(ledger.store().entries().is_empty());
    }

    #[tokio::test]
    async fn test_journal_failure_rolls_back_balances() {
        let ledger = ledger_with(&[("A", 100), ("B", 0)]);
        ledger.store().inject(Fault::FailAppend);

        let result = ledger.trade(&Dealing::new("A", "B", 10)).await;

        assert!(matches!(result, Err(LedgerError::Database(_))));
        assert_eq!(ledger.store().balance("A"), Some(100));
        assert_eq!(ledger.store().balance("B"), Some(0));
    }

    #[tokio::test]
    async fn test_panic_during_trade_is_aborted() {
        let ledger = ledger_with(&[("A", 100), ("B", 0)]);
        ledger.store().inject(Fault::PanicOnAppend);

        let result = ledger.trade(&Dealing::new("A", "B", 10)).await;

        assert!(matches!(result, Err(LedgerError::Aborted(_))));
        assert_eq!(ledger.store().balance("A"), Some(100));
        assert_eq!(ledger.store().balance("B"), Some(0));
    }

    #[tokio::test]
    async fn test_trade_deadline_aborts() {
        let ledger = ledger_with(&[("A", 100), ("B", 0)])
            .with_trade_timeout(Some(Duration::from_millis(20)));
        ledger.store().inject(Fault::StallOnAppend);

        let result = ledger.trade(&Dealing::new("A", "B", 10)).await;

        assert_eq!(
            result,
            Err(LedgerError::Aborted("deadline exceeded".to_string()))
        );
        assert_eq!(ledger.store().balance("A"), Some(100));
    }

    #[tokio::test]
    async fn test_cancelled_token_aborts_before_mutation() {
        let ledger = ledger_with(&[("A", 100), ("B", 0)]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = ledger
            .trade_with_cancel(&Dealing::new("A", "B", 10), &cancel)
            .await;

        assert_eq!(result, Err(LedgerError::Aborted("cancelled".to_string())));
        assert_eq!(ledger.store().balance("A"), Some(100));
        assert!(ledger.store().entries().is_empty());
    }

    #[tokio::test]
    async fn test_idempotency_key_replays_trade() {
        let ledger = ledger_with(&[("A", 1000), ("B", 0)]);
        let dealing = Dealing::new("A", "B", 600).with_idempotency_key("req-1");

        let first = ledger.trade(&dealing).await.unwrap();
        let replay = ledger.trade(&dealing).await.unwrap();

        assert_eq!(first, replay);
        assert_eq!(ledger.store().balance("A"), Some(400));
        assert_eq!(ledger.store().balance("B"), Some(600));
        assert_eq!(ledger.store().entries().len(), 2);
    }

    #[tokio::test]
    async fn test_key_reused_for_other_account_is_refused() {
        let ledger = ledger_with(&[
            (PSEUDO_ACCOUNT, PSEUDO_ACCOUNT_FLOAT),
            ("tim", 0),
            ("alex", 0),
        ]);

        let tim = ledger
            .trade(&Dealing::new(PSEUDO_ACCOUNT, "tim", 100).with_idempotency_key("k"))
            .await
            .unwrap();
        let alex = ledger
            .trade(&Dealing::new(PSEUDO_ACCOUNT, "alex", 999).with_idempotency_key("k"))
            .await;

        assert_eq!(alex, Err(LedgerError::IdempotencyKeyReused("k".to_string())));
        assert_eq!(ledger.store().balance("tim"), Some(100));
        assert_eq!(ledger.store().balance("alex"), Some(0));
        let entries = ledger.store().entries();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.trade_id == tim));
    }

    #[tokio::test]
    async fn test_key_reused_with_other_amount_is_refused() {
        let ledger = ledger_with(&[("A", 1000), ("B", 0)]);

        ledger
            .trade(&Dealing::new("A", "B", 100).with_idempotency_key("req-2"))
            .await
            .unwrap();
        let changed = ledger
            .trade(&Dealing::new("A", "B", 200).with_idempotency_key("req-2"))
            .await;

        assert_eq!(
            changed,
            Err(LedgerError::IdempotencyKeyReused("req-2".to_string()))
        );
        assert_eq!(ledger.store().balance("A"), Some(900));
        assert_eq!(ledger.store().balance("B"), Some(100));
    }

    #[tokio::test]
    async fn test_key_of_refused_trade_is_not_recorded() {
        let ledger = ledger_with(&[("A", 50), ("B", 0)]);
        let dealing = Dealing::new("A", "B", 100).with_idempotency_key("req-3");

        let refused = ledger.trade(&dealing).await;
        ledger.store().seed("A", 500);
        let retried = ledger.trade(&dealing).await;

        assert!(matches!(refused, Err(LedgerError::InsufficientFunds { .. })));
        assert!(retried.is_ok());
        assert_eq!(ledger.store().balance("A"), Some(400));
    }

    #[tokio::test]
    async fn test_trade_without_key_is_not_deduplicated() {
        let ledger = ledger_with(&[("A", 1000), ("B", 0)]);
        let dealing = Dealing::new("A", "B", 100);

        let first = ledger.trade(&dealing).await.unwrap();
        let second = ledger.trade(&dealing).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(ledger.store().entries().len(), 4);
    }

    #[tokio::test]
    async fn test_zero_amount_trade_is_journaled() {
        let ledger = ledger_with(&[("A", 0), ("B", 0)]);

        ledger.trade(&Dealing::new("A", "B", 0)).await.unwrap();

        assert_eq!(ledger.store().balance("A"), Some(0));
        assert_eq!(ledger.store().entries().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_withdrawals_never_overdraw() {
        let ledger = Arc::new(ledger_with(&[("A", 1000), ("B", 0)]));

        let attempts = (0..50).map(|_| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move { ledger.trade(&Dealing::new("A", "B", 30)).await })
        });
        let results = join_all(attempts).await;

        let committed = results
            .iter()
            .filter(|r| matches!(r, Ok(Ok(_))))
            .count();
        assert_eq!(committed, 33);
        assert_eq!(ledger.store().balance("A"), Some(10));
        assert_eq!(ledger.store().balance("B"), Some(990));
        assert_eq!(ledger.store().entries().len(), 66);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_opposite_transfers_do_not_deadlock() {
        let ledger = Arc::new(ledger_with(&[("A", 500), ("B", 500)]));

        let attempts = (0..40).map(|i| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move {
                let dealing = if i % 2 == 0 {
                    Dealing::new("A", "B", 10)
                } else {
                    Dealing::new("B", "A", 10)
                };
                ledger.trade(&dealing).await
            })
        });
        let results = tokio::time::timeout(Duration::from_secs(5), join_all(attempts))
            .await
            .expect("transfers must not deadlock");

        assert!(results.iter().all(|r| matches!(r, Ok(Ok(_)))));
        assert_eq!(ledger.store().balance("A"), Some(500));
        assert_eq!(ledger.store().balance("B"), Some(500));
    }

    #[tokio::test]
    async fn test_get_account() {
        let ledger = ledger_with(&[("A", 42)]);

        assert_eq!(
            ledger.get_account("A").await,
            Ok(Account {
                account_id: "A".to_string(),
                balance: 42,
            })
        );
        assert_eq!(
            ledger.get_account("nope").await,
            Err(LedgerError::AccountNotFound("nope".to_string()))
        );
    }

    #[tokio::test]
    async fn test_concurrent_reads_hit_store_once() {
        let store = MemoryStore::new().with_read_delay(Duration::from_millis(30));
        store.seed("A", 1000);
        let ledger = Ledger::new(Arc::new(store));

        let results = join_all((0..25).map(|_| ledger.get_account("A"))).await;

        assert_eq!(ledger.store().reads(), 1);
        assert!(results.iter().all(|r| r.as_ref().map(|a| a.balance) == Ok(1000)));

        ledger.get_account("A").await.unwrap();
        assert_eq!(ledger.store().reads(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_read_failure_is_shared() {
        let store = MemoryStore::new().with_read_delay(Duration::from_millis(30));
        store.inject(Fault::FailRead);
        let ledger = Ledger::new(Arc::new(store));

        let results = join_all((0..5).map(|_| ledger.get_account("A"))).await;

        assert_eq!(ledger.store().reads(), 1);
        assert!(
            results
                .iter()
                .all(|r| matches!(r, Err(LedgerError::Database(_))))
        );
    }

    #[tokio::test]
    async fn test_abandoned_reads_do_not_serve_later_callers() {
        let store = MemoryStore::new().with_read_delay(Duration::from_millis(50));
        store.seed("A", 100);
        store.seed("B", 100);
        let ledger = Ledger::new(Arc::new(store));

        let abandoned = tokio::time::timeout(
            Duration::from_millis(5),
            join_all((0..3).map(|_| ledger.get_account("A"))),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(ledger.reads.in_flight(), 0);

        ledger.trade(&Dealing::new("B", "A", 50)).await.unwrap();

        assert_eq!(ledger.get_account("A").await.unwrap().balance, 150);
        assert_eq!(ledger.store().reads(), 2);
    }

    #[tokio::test]
    async fn test_ping_reaches_store() {
        let ledger = ledger_with(&[]);
        assert_eq!(Bank::ping(&ledger).await, Ok(()));

        ledger.store().inject(Fault::FailRead);
        assert!(matches!(
            Bank::ping(&ledger).await,
            Err(LedgerError::Database(_))
        ));
    }

    #[tokio::test]
    async fn test_reads_of_different_accounts_are_not_coalesced() {
        let store = MemoryStore::new().with_read_delay(Duration::from_millis(30));
        store.seed("A", 1);
        store.seed("B", 2);
        let ledger = Ledger::new(Arc::new(store));

        let (a, b) = tokio::join!(ledger.get_account("A"), ledger.get_account("B"));

        assert_eq!(a.unwrap().balance, 1);
        assert_eq!(b.unwrap().balance, 2);
        assert_eq!(ledger.store().reads(), 2);
    }
}
