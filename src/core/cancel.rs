//! Cooperative cancellation for long-running update phases
//!
//! A single [`CancellationToken`] is shared by every phase of an updating
//! session. Long-running work (download chunk loops, archive extraction,
//! process-wait polling) checks the token at iteration granularity, so a
//! multi-second operation stops within roughly one chunk of latency.
//! Cancellation is a request, never an interruption: each phase observes
//! the flag and unwinds cleanly, which is what lets rollback still run
//! after a cancelled install.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::UpdateError;

/// Shared cancellation flag, cheap to clone and safe to signal from any thread
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a fresh, uncancelled token
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation
    ///
    /// Idempotent; once set the token never resets.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Return `Err(UpdateError::Cancelled)` if cancellation was requested
    ///
    /// The standard check inside chunk loops:
    ///
    /// ```rust
    /// # use upkit::core::CancellationToken;
    /// # fn chunks() -> Vec<Vec<u8>> { vec![] }
    /// # fn run(cancel: &CancellationToken) -> Result<(), upkit::core::UpdateError> {
    /// for chunk in chunks() {
    ///     cancel.err_if_cancelled()?;
    ///     // process chunk
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn err_if_cancelled(&self) -> Result<(), UpdateError> {
        if self.is_cancelled() {
            Err(UpdateError::Cancelled)
        } else {
            Ok(())
        }
    }
}
