//! Business rule validation for dealings.

use super::error::LedgerError;
use super::types::Dealing;

/// Validates that a dealing is well-formed.
///
/// A dealing is well-formed when it moves a non-negative amount between two
/// distinct accounts. Zero amounts are allowed and produce a zero-valued pair.
///
/// # Errors
///
/// Returns `SelfTransfer` or `NegativeAmount`.
pub fn validate_dealing(dealing: &Dealing) -> Result<(), LedgerError> {
    if dealing.from_account_id == dealing.to_account_id {
        return Err(LedgerError::SelfTransfer(dealing.from_account_id.clone()));
    }
    if dealing.amount < 0 {
        return Err(LedgerError::NegativeAmount(dealing.amount));
    }
    Ok(())
}
