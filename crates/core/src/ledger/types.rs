//! Ledger domain types for dealings, accounts and journal entries.
//!
//! This module defines the core types exchanged between the wallet verbs,
//! the ledger engine and the backing store.

use serde::{Deserialize, Serialize};

/// Reserved account representing money entering or leaving the system.
///
/// Deposits draw from it and withdrawals pay into it. It is an ordinary row
/// in the account table and goes through the same balance checks.
pub const PSEUDO_ACCOUNT: &str = "c1e395d9-8c00-4124-819a-85b0402900cf";

/// Opening balance of the pseudo-account.
///
/// Large enough that deposits are never refused for lack of funds, small
/// enough that withdrawals paying into it cannot overflow.
pub const PSEUDO_ACCOUNT_FLOAT: i64 = i64::MAX / 2;

/// An account balance in the smallest currency unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Opaque account identifier.
    pub account_id: String,
    /// Current balance in minor units.
    pub balance: i64,
}

/// A proposed money movement between two accounts.
///
/// Dealings are never persisted. They are built per call by the wallet
/// verbs (or directly by a caller) and consumed by [`crate::ledger::Ledger::trade`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dealing {
    /// Account that is debited.
    pub from_account_id: String,
    /// Account that is credited.
    pub to_account_id: String,
    /// Amount in minor units.
    pub amount: i64,
    /// Optional caller-supplied key; repeating a key with the same dealing
    /// returns the first trade id.
    pub idempotency_key: Option<String>,
}

impl Dealing {
    /// Creates a dealing without an idempotency key.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>, amount: i64) -> Self {
        Self {
            from_account_id: from.into(),
            to_account_id: to.into(),
            amount,
            idempotency_key: None,
        }
    }

    /// Attaches an idempotency key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// The trade committed under an idempotency key, with the dealing it carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTrade {
    /// Trade id handed back on replay.
    pub trade_id: String,
    /// Debited account of the original dealing.
    pub from_account_id: String,
    /// Credited account of the original dealing.
    pub to_account_id: String,
    /// Amount of the original dealing.
    pub amount: i64,
}

impl RecordedTrade {
    /// Records `dealing` as committed under `trade_id`.
    #[must_use]
    pub fn new(dealing: &Dealing, trade_id: &str) -> Self {
        Self {
            trade_id: trade_id.to_string(),
            from_account_id: dealing.from_account_id.clone(),
            to_account_id: dealing.to_account_id.clone(),
            amount: dealing.amount,
        }
    }

    /// Whether `dealing` asks for the same movement as the recorded one.
    #[must_use]
    pub fn matches(&self, dealing: &Dealing) -> bool {
        self.from_account_id == dealing.from_account_id
            && self.to_account_id == dealing.to_account_id
            && self.amount == dealing.amount
    }
}

/// Which way a ledger entry moves its account's balance.
///
/// The discriminants are the values stored in the `direction` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum Direction {
    /// Balance went up (credit side of a trade).
    Increase = 1,
    /// Balance went down (debit side of a trade).
    Decrease = 2,
}

impl Direction {
    /// Returns the stored column value.
    #[must_use]
    pub const fn as_i16(self) -> i16 {
        self as i16
    }

    /// Parses a stored column value.
    #[must_use]
    pub const fn from_i16(value: i16) -> Option<Self> {
        match value {
            1 => Some(Self::Increase),
            2 => Some(Self::Decrease),
            _ => None,
        }
    }
}

/// One side of a completed trade. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Account whose balance moved.
    pub account_id: String,
    /// Direction of the movement.
    pub direction: Direction,
    /// Amount in minor units.
    pub amount: i64,
    /// Unix epoch milliseconds, shared by both entries of a trade.
    pub timestamp_ms: i64,
    /// Trade identifier, shared by both entries of a trade.
    pub trade_id: String,
}

/// Builds the decrease/increase pair recorded for a dealing.
#[must_use]
pub fn journal_pair(dealing: &Dealing, trade_id: &str, timestamp_ms: i64) -> [LedgerEntry; 2] {
    let debit = LedgerEntry {
        account_id: dealing.from_account_id.clone(),
        direction: Direction::Decrease,
        amount: dealing.amount,
        timestamp_ms,
        trade_id: trade_id.to_string(),
    };
    let credit = LedgerEntry {
        account_id: dealing.to_account_id.clone(),
        direction: Direction::Increase,
        amount: dealing.amount,
        timestamp_ms,
        trade_id: trade_id.to_string(),
    };
    [debit, credit]
}
