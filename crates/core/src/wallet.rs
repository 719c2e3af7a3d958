//! Wallet verbs on top of the ledger.
//!
//! Deposits and withdrawals are ordinary trades against the pseudo-account.
//! The service adds no rules of its own: it builds the dealing, hands it to
//! the [`Bank`] and returns whatever comes back, logging failures.

use std::sync::Arc;

use tracing::error;

use crate::ledger::{Account, Bank, Dealing, LedgerError, PSEUDO_ACCOUNT};

/// Deposit, withdraw, transfer and balance lookup for wallet accounts.
#[derive(Clone)]
pub struct WalletService {
    bank: Arc<dyn Bank>,
}

impl WalletService {
    /// Creates a service over a bank.
    #[must_use]
    pub fn new(bank: Arc<dyn Bank>) -> Self {
        Self { bank }
    }

    /// Moves `amount` from the pseudo-account into `account_id`.
    ///
    /// # Errors
    ///
    /// Any [`LedgerError`] returned by the bank.
    pub async fn deposit(&self, account_id: &str, amount: i64) -> Result<String, LedgerError> {
        self.deposit_with_key(account_id, amount, None).await
    }

    /// [`WalletService::deposit`] with an optional idempotency key.
    ///
    /// # Errors
    ///
    /// Any [`LedgerError`] returned by the bank.
    pub async fn deposit_with_key(
        &self,
        account_id: &str,
        amount: i64,
        key: Option<&str>,
    ) -> Result<String, LedgerError> {
        let dealing = keyed(Dealing::new(PSEUDO_ACCOUNT, account_id, amount), key);
        self.bank.trade(&dealing).await.inspect_err(|err| {
            error!(account_id, amount, error = %err, "bank trade failed in deposit");
        })
    }

    /// Moves `amount` from `account_id` into the pseudo-account.
    ///
    /// # Errors
    ///
    /// Any [`LedgerError`] returned by the bank.
    pub async fn withdraw(&self, account_id: &str, amount: i64) -> Result<String, LedgerError> {
        self.withdraw_with_key(account_id, amount, None).await
    }

    /// [`WalletService::withdraw`] with an optional idempotency key.
    ///
    /// # Errors
    ///
    /// Any [`LedgerError`] returned by the bank.
    pub async fn withdraw_with_key(
        &self,
        account_id: &str,
        amount: i64,
        key: Option<&str>,
    ) -> Result<String, LedgerError> {
        let dealing = keyed(Dealing::new(account_id, PSEUDO_ACCOUNT, amount), key);
        self.bank.trade(&dealing).await.inspect_err(|err| {
            error!(account_id, amount, error = %err, "bank trade failed in withdraw");
        })
    }

    /// Moves `amount` from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Any [`LedgerError`] returned by the bank.
    pub async fn transfer(&self, from: &str, to: &str, amount: i64) -> Result<String, LedgerError> {
        self.transfer_with_key(from, to, amount, None).await
    }

    /// [`WalletService::transfer`] with an optional idempotency key.
    ///
    /// # Errors
    ///
    /// Any [`LedgerError`] returned by the bank.
    pub async fn transfer_with_key(
        &self,
        from: &str,
        to: &str,
        amount: i64,
        key: Option<&str>,
    ) -> Result<String, LedgerError> {
        let dealing = keyed(Dealing::new(from, to, amount), key);
        self.bank.trade(&dealing).await.inspect_err(|err| {
            error!(from, to, amount, error = %err, "bank trade failed in transfer");
        })
    }

    /// Reads an account.
    ///
    /// # Errors
    ///
    /// Any [`LedgerError`] returned by the bank.
    pub async fn get_account(&self, account_id: &str) -> Result<Account, LedgerError> {
        self.bank.get_account(account_id).await.inspect_err(|err| {
            error!(account_id, error = %err, "bank get_account failed");
        })
    }

    /// Checks that the ledger's store is reachable.
    ///
    /// # Errors
    ///
    /// The store failure, typically [`LedgerError::Database`].
    pub async fn ping(&self) -> Result<(), LedgerError> {
        self.bank.ping().await
    }
}

fn keyed(dealing: Dealing, key: Option<&str>) -> Dealing {
    match key {
        Some(key) => dealing.with_idempotency_key(key),
        None => dealing,
    }
}
