use super::DeletionTask;
use stubby_core::ShortenerError;
use tokio::sync::mpsc;
use tracing::trace;

/// Producer side of the deletion pipeline.
///
/// Cloning is cheap; all clones feed the same worker.
#[derive(Debug, Clone)]
pub struct DeletionQueue {
    sender: mpsc::Sender<DeletionTask>,
}

impl DeletionQueue {
    pub(crate) fn new(sender: mpsc::Sender<DeletionTask>) -> Self {
        Self { sender }
    }

    /// Hands a task to the worker.
    ///
    /// Waits while the queue is full. Fails with
    /// [`ShortenerError::DeletionUnavailable`] once the worker has shut down.
    pub async fn enqueue(&self, task: DeletionTask) -> Result<(), ShortenerError> {
        trace!(owner = %task.owner, codes = task.codes.len(), "enqueueing deletion task");
        self.sender
            .send(task)
            .await
            .map_err(|_| ShortenerError::DeletionUnavailable)
    }

    /// Number of tasks that can be enqueued without waiting.
    pub fn available(&self) -> usize {
        self.sender.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
