//! Core wallet logic.
//!
//! This crate contains the ledger engine with ZERO web or database dependencies.
//! Storage is reached through the [`ledger::LedgerStore`] trait.
//!
//! # Modules
//!
//! - `ledger` - Double-entry trades, validation and units of work
//! - `coalesce` - Sharing of concurrent identical reads
//! - `wallet` - Deposit, withdraw and transfer verbs

pub mod coalesce;
pub mod ledger;
pub mod wallet;

pub use wallet::WalletService;
