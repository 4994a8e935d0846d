use super::limiter::ConcurrencyLimiter;
use super::DeletionTask;
use std::sync::Arc;
use stubby_core::{Repository, ShortCode};
use tokio::task::JoinSet;
use tracing::{debug, trace, warn};

fn join_codes(codes: &[ShortCode]) -> String {
    codes
        .iter()
        .map(ShortCode::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// Runs flushed tasks against storage under the concurrency limit.
pub(crate) struct Dispatcher<R> {
    repository: Arc<R>,
    limiter: ConcurrencyLimiter,
    in_flight: JoinSet<()>,
}

impl<R: Repository> Dispatcher<R> {
    pub(crate) fn new(repository: Arc<R>, limiter: ConcurrencyLimiter) -> Self {
        Self {
            repository,
            limiter,
            in_flight: JoinSet::new(),
        }
    }

    /// Starts one storage call per task, in order.
    ///
    /// Waits for a free slot before each call, so the tasks of a large
    /// flush start in waves. Returns once every task has been started.
    pub(crate) async fn dispatch(&mut self, tasks: Vec<DeletionTask>) {
        for task in tasks {
            let guard = match self.limiter.acquire().await {
                Ok(guard) => guard,
                Err(e) => {
                    warn!(owner = %task.owner, codes = %join_codes(&task.codes), error = %e, "dropping deletion task");
                    continue;
                }
            };
            trace!(free_slots = self.limiter.available_permits(), "acquired deletion slot");

            self.reap();

            let repository = Arc::clone(&self.repository);
            self.in_flight.spawn(async move {
                let _guard = guard;
                match repository.delete_batch(&task.codes, &task.owner).await {
                    Ok(deleted) => {
                        debug!(owner = %task.owner, requested = task.codes.len(), deleted, "deleted short urls");
                    }
                    Err(e) => {
                        warn!(owner = %task.owner, codes = %join_codes(&task.codes), error = %e, "failed to delete short urls");
                    }
                }
            });
        }
    }

    /// Waits until every started storage call has finished.
    pub(crate) async fn wait_idle(&mut self) {
        while let Some(result) = self.in_flight.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "deletion task panicked");
            }
        }
    }

    fn reap(&mut self) {
        while let Some(result) = self.in_flight.try_join_next() {
            if let Err(e) = result {
                warn!(error = %e, "deletion task panicked");
            }
        }
    }
}
