//! All-or-nothing execution of ledger steps.
//!
//! [`within_unit`] is the only way the engine touches a [`TradeUnit`]. It
//! commits when the steps return `Ok` and rolls back on every other exit:
//! an error, a panic inside the steps, an expired deadline or a cancelled
//! token. A caller that drops the returned future mid-flight drops the unit
//! too, and stores discard uncommitted units on drop.

use std::any::Any;
use std::future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::error::LedgerError;
use super::store::{LedgerStore, TradeUnit};

/// Runs `steps` inside a fresh unit of work.
///
/// # Errors
///
/// Returns the error produced by `steps`, `Aborted` on panic, cancellation or
/// deadline expiry, or the store's error if the unit cannot begin or commit.
pub async fn within_unit<S, T, F>(
    store: &S,
    cancel: &CancellationToken,
    deadline: Option<Duration>,
    steps: F,
) -> Result<T, LedgerError>
where
    S: LedgerStore + ?Sized,
    T: Send,
    F: for<'u> FnOnce(&'u mut dyn TradeUnit) -> BoxFuture<'u, Result<T, LedgerError>> + Send,
{
    let mut unit = store.begin().await?;

    let outcome = {
        let work = AssertUnwindSafe(steps(&mut *unit)).catch_unwind();
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(LedgerError::Aborted("cancelled".to_string())),
            () = expire(deadline) => Err(LedgerError::Aborted("deadline exceeded".to_string())),
            caught = work => caught.unwrap_or_else(|panic| {
                Err(LedgerError::Aborted(panic_message(panic.as_ref())))
            }),
        }
    };

    match outcome {
        Ok(value) => {
            unit.commit().await?;
            Ok(value)
        }
        Err(err) => {
            debug!(error = %err, "rolling back unit of work");
            if let Err(rollback_err) = unit.rollback().await {
                error!(error = %rollback_err, "unit of work rollback failed");
            }
            Err(err)
        }
    }
}

async fn expire(deadline: Option<Duration>) {
    match deadline {
        Some(after) => tokio::time::sleep(after).await,
        None => future::pending().await,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panic: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panic: {message}")
    } else {
        "panic".to_string()
    }
}
