//! Asynchronous batch deletion.
//!
//! Requests are accepted by a [`DeletionQueue`], accumulated by a single
//! [`DeletionWorker`] task and flushed to storage in batches, either when
//! the batch is full or when the flush interval elapses. Each task of a
//! flush runs as its own storage call, with at most `max_in_flight` calls
//! running at once.

mod dispatcher;
mod limiter;
mod queue;
mod worker;

pub use queue::DeletionQueue;
pub use worker::{DeletionHandle, DeletionWorker};

use std::time::Duration;
use stubby_core::{OwnerId, ShortCode};
use typed_builder::TypedBuilder;

/// One caller's request to delete a set of their codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionTask {
    pub owner: OwnerId,
    /// Codes in the order the caller supplied them.
    pub codes: Vec<ShortCode>,
}

impl DeletionTask {
    pub fn new(owner: OwnerId, codes: Vec<ShortCode>) -> Self {
        Self { owner, codes }
    }
}

/// Tunables of the deletion pipeline.
///
/// Zero values are raised to the smallest usable value.
#[derive(Debug, Clone, TypedBuilder)]
pub struct DeletionSettings {
    /// Number of tasks the queue holds before `enqueue` starts waiting.
    #[builder(default = 10)]
    pub queue_capacity: usize,
    /// Number of accumulated tasks that triggers an immediate flush.
    #[builder(default = 100)]
    pub batch_size: usize,
    /// Period of the timer flush.
    #[builder(default = Duration::from_secs(10))]
    pub flush_interval: Duration,
    /// Maximum number of concurrent storage calls.
    #[builder(default = 5)]
    pub max_in_flight: usize,
}

impl Default for DeletionSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DeletionSettings {
    fn queue_capacity(&self) -> usize {
        self.queue_capacity.max(1)
    }

    fn batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    fn flush_interval(&self) -> Duration {
        self.flush_interval.max(Duration::from_millis(1))
    }

    fn max_in_flight(&self) -> usize {
        self.max_in_flight.max(1)
    }
}
