//! Ledger error types for validation, balance and persistence failures.
//!
//! Errors are `Clone` so that a single coalesced read can hand the same
//! failure to every waiter.

use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Source and destination are the same account.
    #[error("Self transfer on account {0}")]
    SelfTransfer(String),

    /// Dealing amount is negative.
    #[error("Amount cannot be negative: {0}")]
    NegativeAmount(i64),

    /// An idempotency key was already used for a different dealing.
    #[error("Idempotency key {0} was already used for a different dealing")]
    IdempotencyKeyReused(String),

    // ========== Account Errors ==========
    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Source balance is below the requested amount.
    #[error("Insufficient funds on account {account_id}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// The debited account.
        account_id: String,
        /// Balance observed under lock.
        balance: i64,
        /// Amount the dealing asked for.
        requested: i64,
    },

    // ========== Persistence Errors ==========
    /// A balance update touched an unexpected number of rows.
    #[error("Balance update on account {account_id} affected {affected} rows")]
    UnexpectedRowsAffected {
        /// The account being updated.
        account_id: String,
        /// Rows reported by the store.
        affected: u64,
    },

    /// Store failure.
    #[error("Database error: {0}")]
    Database(String),

    // ========== Unit Of Work Errors ==========
    /// The unit of work was abandoned (panic, cancellation, deadline) and rolled back.
    #[error("Trade aborted: {0}")]
    Aborted(String),
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SelfTransfer(_) => "SELF_TRANSFER",
            Self::NegativeAmount(_) => "NEGATIVE_AMOUNT",
            Self::IdempotencyKeyReused(_) => "IDEMPOTENCY_KEY_REUSED",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::UnexpectedRowsAffected { .. } => "UPDATE_BALANCE_FAILED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Aborted(_) => "TRADE_ABORTED",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - malformed or conflicting requests
            Self::SelfTransfer(_) | Self::NegativeAmount(_) | Self::IdempotencyKeyReused(_) => 400,

            // 404 Not Found
            Self::AccountNotFound(_) => 404,

            // 422 Unprocessable - well-formed but refused
            Self::InsufficientFunds { .. } => 422,

            // 500 Internal Server Error
            Self::UnexpectedRowsAffected { .. } | Self::Database(_) | Self::Aborted(_) => 500,
        }
    }

    /// Returns true if the request is invalid as sent.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::SelfTransfer(_) | Self::NegativeAmount(_) | Self::IdempotencyKeyReused(_)
        )
    }

    /// Returns true if the caller caused this error.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.http_status_code() < 500
    }
}
