//! Token to account resolution.

use std::collections::HashMap;

/// Maps bearer tokens to wallet account ids.
///
/// Stands in for a real identity provider: the table is loaded from
/// configuration at startup and never changes afterwards.
#[derive(Debug, Clone, Default)]
pub struct AccountDirectory {
    accounts: HashMap<String, String>,
}

impl AccountDirectory {
    /// Creates a directory from a token to account id table.
    #[must_use]
    pub const fn new(accounts: HashMap<String, String>) -> Self {
        Self { accounts }
    }

    /// Returns the account id registered for `token`.
    #[must_use]
    pub fn resolve(&self, token: &str) -> Option<&str> {
        self.accounts.get(token).map(String::as_str)
    }

    /// Number of registered tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether no token is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AccountDirectory {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(token, account)| (token.into(), account.into()))
                .collect(),
        )
    }
}
