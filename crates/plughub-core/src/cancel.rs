//! Shutdown-aware cancellation token.
//!
//! The server creates one token at startup and hands clones to the refresh
//! scheduler, the rate-limit sweeper and every enrichment run. Firing any
//! clone is visible to all of them, either through
//! [`CancellationToken::is_cancelled`] or by awaiting
//! [`CancellationToken::cancelled`].
//!
//! ```
//! use plughub_core::cancel::CancellationToken;
//!
//! let shutdown = CancellationToken::new();
//! let worker = shutdown.clone();
//! shutdown.cancel();
//! assert!(worker.is_cancelled());
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Shared {
    fired: AtomicBool,
    wakeup: Notify,
}

#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    shared: Arc<Shared>,
}

/// The awaited work was abandoned because its token fired.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Operation was cancelled")]
pub struct CancelledError;

impl From<CancelledError> for crate::error::PlughubError {
    fn from(_: CancelledError) -> Self {
        crate::error::PlughubError::Cancelled
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the token and wake every pending [`cancelled`](Self::cancelled).
    pub fn cancel(&self) {
        self.shared.fired.store(true, Ordering::SeqCst);
        self.shared.wakeup.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.fired.load(Ordering::SeqCst)
    }

    /// `Err(CancelledError)` once the token has fired.
    pub fn check(&self) -> Result<(), CancelledError> {
        if self.is_cancelled() {
            return Err(CancelledError);
        }
        Ok(())
    }

    /// Resolves once the token fires.
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            // Must be created before the flag is re-read, or a cancel landing
            // in between is lost.
            let wakeup = self.shared.wakeup.notified();
            if self.is_cancelled() {
                break;
            }
            wakeup.await;
        }
    }

    /// Await `work`, dropping it early if the token fires first. Dropping
    /// the future aborts whatever request it had in flight.
    pub async fn run_until_cancelled<F: Future>(
        &self,
        work: F,
    ) -> Result<F::Output, CancelledError> {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(CancelledError),
            output = work => Ok(output),
        }
    }
}
