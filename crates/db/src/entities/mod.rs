//! `SeaORM` entities for the wallet schema.

pub mod account;
pub mod ledger_entry;
pub mod trade_key;
