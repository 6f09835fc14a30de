//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::{Error, Result};

/// A shared cancellation flag.
///
/// Clones share the same flag. Chunkers check it between batch items and
/// around embedding-provider calls; the CPU-bound splitters themselves run
/// to completion once started.
///
/// ```rust
/// use tranche::Cancellation;
///
/// let cancel = Cancellation::new();
/// let handle = cancel.clone();
/// assert!(cancel.check().is_ok());
///
/// handle.cancel();
/// assert!(cancel.is_cancelled());
/// assert!(cancel.check().is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    /// Create a flag that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// `Err(Error::Cancelled)` once cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Check an optional cancellation flag.
pub(crate) fn check(cancellation: Option<&Cancellation>) -> Result<()> {
    cancellation.map_or(Ok(()), Cancellation::check)
}
