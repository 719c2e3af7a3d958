//! Property-based tests for the ledger engine.
//!
//! - Conservation: trades never create or destroy money
//! - Non-negativity: no balance ever drops below zero
//! - Journal agreement: every balance equals its opening value plus its entries

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;

use super::engine::Ledger;
use super::error::LedgerError;
use super::memory::MemoryStore;
use super::types::{Dealing, Direction};

const ACCOUNTS: [&str; 4] = ["acct-a", "acct-b", "acct-c", "acct-d"];

/// Strategy for opening balances of the four accounts.
fn opening_balances() -> impl Strategy<Value = [i64; 4]> {
    prop::array::uniform4(0i64..5_000)
}

/// Strategy for a dealing between two (possibly equal) known accounts.
fn dealing() -> impl Strategy<Value = Dealing> {
    (0usize..4, 0usize..4, -50i64..3_000)
        .prop_map(|(from, to, amount)| Dealing::new(ACCOUNTS[from], ACCOUNTS[to], amount))
}

fn run_trades(opening: [i64; 4], dealings: &[Dealing]) -> (Ledger<MemoryStore>, usize) {
    let store = MemoryStore::new();
    for (id, balance) in ACCOUNTS.iter().zip(opening) {
        store.seed(id, balance);
    }
    let ledger = Ledger::new(Arc::new(store));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let committed = runtime.block_on(async {
        let mut committed = 0;
        for dealing in dealings {
            match ledger.trade(dealing).await {
                Ok(_) => committed += 1,
                Err(
                    LedgerError::SelfTransfer(_)
                    | LedgerError::NegativeAmount(_)
                    | LedgerError::InsufficientFunds { .. },
                ) => {}
                Err(other) => panic!("unexpected trade failure: {other}"),
            }
        }
        committed
    });
    (ledger, committed)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The sum of all balances is the same before and after any sequence of trades.
    #[test]
    fn prop_trades_conserve_money(
        opening in opening_balances(),
        dealings in prop::collection::vec(dealing(), 0..40),
    ) {
        let (ledger, _) = run_trades(opening, &dealings);

        let before: i64 = opening.iter().sum();
        let after: i64 = ACCOUNTS
            .iter()
            .map(|id| ledger.store().balance(id).unwrap())
            .sum();
        prop_assert_eq!(before, after);
    }

    /// Balances stay non-negative whatever is attempted.
    #[test]
    fn prop_balances_never_negative(
        opening in opening_balances(),
        dealings in prop::collection::vec(dealing(), 0..40),
    ) {
        let (ledger, _) = run_trades(opening, &dealings);

        for id in ACCOUNTS {
            prop_assert!(ledger.store().balance(id).unwrap() >= 0);
        }
    }

    /// Each balance equals its opening balance plus the net of its entries,
    /// and every committed trade wrote exactly one pair.
    #[test]
    fn prop_journal_agrees_with_balances(
        opening in opening_balances(),
        dealings in prop::collection::vec(dealing(), 0..40),
    ) {
        let (ledger, committed) = run_trades(opening, &dealings);
        let entries = ledger.store().entries();
        prop_assert_eq!(entries.len(), committed * 2);

        let mut net: HashMap<&str, i64> = HashMap::new();
        for entry in &entries {
            let signed = match entry.direction {
                Direction::Increase => entry.amount,
                Direction::Decrease => -entry.amount,
            };
            *net.entry(entry.account_id.as_str()).or_default() += signed;
        }

        for (id, balance) in ACCOUNTS.iter().zip(opening) {
            let expected = balance + net.get(id).copied().unwrap_or_default();
            prop_assert_eq!(ledger.store().balance(id), Some(expected));
        }

        for pair in entries.chunks(2) {
            prop_assert_eq!(&pair[0].trade_id, &pair[1].trade_id);
            prop_assert_eq!(pair[0].amount, pair[1].amount);
            prop_assert_eq!(pair[0].direction, Direction::Decrease);
            prop_assert_eq!(pair[1].direction, Direction::Increase);
        }
    }
}
