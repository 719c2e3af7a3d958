//! Double-entry ledger.
//!
//! This module implements the money-moving core:
//! - Dealings, accounts and journal entries
//! - Dealing validation
//! - The storage seam and the in-memory store
//! - All-or-nothing units of work
//! - The ledger engine and the `Bank` surface it exposes

pub mod engine;
pub mod error;
pub mod memory;
pub mod store;
pub mod types;
pub mod unit;
pub mod validation;

#[cfg(test)]
mod engine_props;

#[cfg(test)]
pub use engine::MockBank;
pub use engine::{Bank, Ledger};
pub use error::LedgerError;
pub use memory::{Fault, MemoryStore};
pub use store::{LedgerStore, TradeUnit};
pub use types::{
    Account, Dealing, Direction, LedgerEntry, PSEUDO_ACCOUNT, PSEUDO_ACCOUNT_FLOAT, RecordedTrade,
    journal_pair,
};
pub use unit::within_unit;
pub use validation::validate_dealing;
