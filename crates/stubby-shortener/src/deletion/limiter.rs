//! Concurrency limiting for storage deletions.

use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Guard that holds a permit and releases it on drop.
///
/// Moving the guard into a spawned task keeps the slot taken until that
/// task finishes, however it finishes.
#[derive(Debug)]
pub(crate) struct ConcurrencyGuard {
    _permit: OwnedSemaphorePermit,
}

/// Caps the number of deletions running against storage at once.
#[derive(Debug, Clone)]
pub(crate) struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyLimiter {
    pub(crate) fn new(max_concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
        }
    }

    /// Waits for a free slot.
    ///
    /// Only fails if the limiter was closed.
    pub(crate) async fn acquire(&self) -> Result<ConcurrencyGuard, AcquireError> {
        let permit = Arc::clone(&self.semaphore).acquire_owned().await?;
        Ok(ConcurrencyGuard { _permit: permit })
    }

    /// Slots not currently held by a running deletion.
    pub(crate) fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}
