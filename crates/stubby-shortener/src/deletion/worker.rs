use super::dispatcher::Dispatcher;
use super::limiter::ConcurrencyLimiter;
use super::queue::DeletionQueue;
use super::{DeletionSettings, DeletionTask};
use std::sync::Arc;
use std::time::Duration;
use stubby_core::Repository;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Consumer side of the deletion pipeline.
///
/// Creating a worker starts nothing; call [`DeletionWorker::spawn`] to run
/// the loop on the current runtime.
pub struct DeletionWorker<R> {
    receiver: mpsc::Receiver<DeletionTask>,
    dispatcher: Dispatcher<R>,
    batch_size: usize,
    flush_interval: Duration,
    cancel: CancellationToken,
}

impl<R: Repository> DeletionWorker<R> {
    /// Builds the queue and its worker.
    pub fn new(repository: Arc<R>, settings: DeletionSettings) -> (DeletionQueue, Self) {
        let (sender, receiver) = mpsc::channel(settings.queue_capacity());
        let limiter = ConcurrencyLimiter::new(settings.max_in_flight());

        let worker = Self {
            receiver,
            dispatcher: Dispatcher::new(repository, limiter),
            batch_size: settings.batch_size(),
            flush_interval: settings.flush_interval(),
            cancel: CancellationToken::new(),
        };

        (DeletionQueue::new(sender), worker)
    }

    /// Starts the worker loop.
    pub fn spawn(self) -> DeletionHandle {
        let cancel = self.cancel.clone();
        let join = tokio::spawn(self.run());
        DeletionHandle { cancel, join }
    }

    async fn run(mut self) {
        info!(
            batch_size = self.batch_size,
            flush_interval_ms = self.flush_interval.as_millis() as u64,
            "deletion worker started"
        );

        let mut ticker = time::interval_at(Instant::now() + self.flush_interval, self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pending = Vec::with_capacity(self.batch_size);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                received = self.receiver.recv() => match received {
                    Some(task) => {
                        pending.push(task);
                        if pending.len() >= self.batch_size {
                            self.flush(&mut pending).await;
                        }
                    }
                    // Every queue handle is gone.
                    None => break,
                },
                _ = ticker.tick() => {
                    if !pending.is_empty() {
                        self.flush(&mut pending).await;
                    }
                }
            }
        }

        self.receiver.close();
        while let Some(task) = self.receiver.recv().await {
            pending.push(task);
            if pending.len() >= self.batch_size {
                self.flush(&mut pending).await;
            }
        }
        if !pending.is_empty() {
            self.flush(&mut pending).await;
        }
        self.dispatcher.wait_idle().await;

        info!("deletion worker stopped");
    }

    async fn flush(&mut self, pending: &mut Vec<DeletionTask>) {
        let tasks = std::mem::replace(pending, Vec::with_capacity(self.batch_size));
        debug!(tasks = tasks.len(), "flushing deletion tasks");
        self.dispatcher.dispatch(tasks).await;
    }
}

/// Handle to a running [`DeletionWorker`].
#[derive(Debug)]
pub struct DeletionHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl DeletionHandle {
    /// Stops the worker after draining it.
    ///
    /// The queue stops accepting tasks, every task already accepted is
    /// flushed and this returns when all storage calls have finished.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            warn!(error = %e, "deletion worker terminated abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use stubby_core::repository::Result;
    use stubby_core::{
        OwnerId, ReadRepository, ShortCode, ShortenerError, Stats, StorageError, UrlRecord,
    };

    /// Records every delete call; optionally slow, optionally failing for one owner.
    #[derive(Default)]
    struct RecordingRepository {
        calls: Mutex<Vec<DeletionTask>>,
        notify: Option<mpsc::UnboundedSender<Instant>>,
        latency: Duration,
        failing_owner: Option<OwnerId>,
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl RecordingRepository {
        fn calls(&self) -> Vec<DeletionTask> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReadRepository for RecordingRepository {
        async fn get(&self, _code: &ShortCode) -> Result<Option<UrlRecord>> {
            Ok(None)
        }

        async fn exists(&self, _code: &ShortCode, _owner: &OwnerId) -> Result<bool> {
            Ok(false)
        }

        async fn list_by_owner(&self, _owner: &OwnerId) -> Result<Vec<UrlRecord>> {
            Ok(Vec::new())
        }

        async fn stats(&self) -> Result<Stats> {
            Ok(Stats::default())
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl Repository for RecordingRepository {
        async fn save(&self, _record: UrlRecord) -> Result<()> {
            Ok(())
        }

        async fn save_batch(&self, _records: Vec<UrlRecord>) -> Result<()> {
            Ok(())
        }

        async fn delete_batch(&self, codes: &[ShortCode], owner: &OwnerId) -> Result<u64> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            if !self.latency.is_zero() {
                time::sleep(self.latency).await;
            }

            self.current.fetch_sub(1, Ordering::SeqCst);
            self.calls
                .lock()
                .unwrap()
                .push(DeletionTask::new(owner.clone(), codes.to_vec()));
            if let Some(notify) = &self.notify {
                let _ = notify.send(Instant::now());
            }

            if self.failing_owner.as_ref() == Some(owner) {
                return Err(StorageError::Unavailable("storage is down".to_string()));
            }
            Ok(codes.len() as u64)
        }
    }

    fn owner(id: &str) -> OwnerId {
        OwnerId::new(id).unwrap()
    }

    fn task(id: &str, codes: &[&str]) -> DeletionTask {
        DeletionTask::new(
            owner(id),
            codes.iter().map(|c| ShortCode::new_unchecked(*c)).collect(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn flushes_when_batch_is_full() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let repo = Arc::new(RecordingRepository {
            notify: Some(tx),
            ..Default::default()
        });
        let settings = DeletionSettings::builder()
            .batch_size(3)
            .flush_interval(Duration::from_secs(10))
            .build();
        let (queue, worker) = DeletionWorker::new(Arc::clone(&repo), settings);
        let handle = worker.spawn();
        let start = Instant::now();

        for i in 0..3 {
            queue.enqueue(task("u1", &[&format!("code0{i}")])).await.unwrap();
        }

        for _ in 0..3 {
            let at = rx.recv().await.unwrap();
            assert!(at - start < Duration::from_secs(10));
        }
        assert_eq!(repo.calls().len(), 3);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn flushes_on_interval() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let repo = Arc::new(RecordingRepository {
            notify: Some(tx),
            ..Default::default()
        });
        let settings = DeletionSettings::builder()
            .flush_interval(Duration::from_secs(10))
            .build();
        let (queue, worker) = DeletionWorker::new(Arc::clone(&repo), settings);
        let handle = worker.spawn();
        let start = Instant::now();

        queue.enqueue(task("u1", &["abc123"])).await.unwrap();

        let at = rx.recv().await.unwrap();
        assert!(at - start >= Duration::from_secs(10));
        assert_eq!(repo.calls(), vec![task("u1", &["abc123"])]);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn limits_concurrent_deletions() {
        let repo = Arc::new(RecordingRepository {
            latency: Duration::from_millis(100),
            ..Default::default()
        });
        let settings = DeletionSettings::builder()
            .queue_capacity(20)
            .batch_size(12)
            .build();
        let (queue, worker) = DeletionWorker::new(Arc::clone(&repo), settings);
        let handle = worker.spawn();

        for i in 0..12 {
            queue.enqueue(task(&format!("u{i}"), &["abc123"])).await.unwrap();
        }
        handle.shutdown().await;

        assert_eq!(repo.calls().len(), 12);
        assert_eq!(repo.peak.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_task_does_not_affect_siblings() {
        let repo = Arc::new(RecordingRepository {
            failing_owner: Some(owner("bad")),
            ..Default::default()
        });
        let settings = DeletionSettings::builder().batch_size(2).build();
        let (queue, worker) = DeletionWorker::new(Arc::clone(&repo), settings);
        let handle = worker.spawn();

        queue.enqueue(task("bad", &["aaa111"])).await.unwrap();
        queue.enqueue(task("good", &["bbb222"])).await.unwrap();
        queue.enqueue(task("good", &["ccc333"])).await.unwrap();
        handle.shutdown().await;

        let owners: Vec<_> = repo.calls().into_iter().map(|t| t.owner).collect();
        assert_eq!(owners.len(), 3);
        assert_eq!(owners.iter().filter(|o| **o == owner("good")).count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_blocks_producer() {
        let repo = Arc::new(RecordingRepository::default());
        let settings = DeletionSettings::builder().queue_capacity(1).build();
        let (queue, worker) = DeletionWorker::new(Arc::clone(&repo), settings);

        queue.enqueue(task("u1", &["aaa111"])).await.unwrap();
        assert_eq!(queue.available(), 0);

        let blocked = time::timeout(
            Duration::from_millis(100),
            queue.enqueue(task("u1", &["bbb222"])),
        )
        .await;
        assert!(blocked.is_err());

        let handle = worker.spawn();
        queue.enqueue(task("u1", &["bbb222"])).await.unwrap();
        handle.shutdown().await;

        assert_eq!(repo.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_drains_accepted_tasks() {
        let repo = Arc::new(RecordingRepository::default());
        let (queue, worker) = DeletionWorker::new(Arc::clone(&repo), DeletionSettings::default());

        for i in 0..5 {
            queue
                .enqueue(task("u1", &[&format!("code0{i}")]))
                .await
                .unwrap();
        }

        let handle = worker.spawn();
        handle.shutdown().await;

        let calls = repo.calls();
        assert_eq!(calls.len(), 5);
        assert!(calls.contains(&task("u1", &["code00"])));

        assert!(queue.is_closed());
        let err = queue.enqueue(task("u1", &["late00"])).await.unwrap_err();
        assert!(matches!(err, ShortenerError::DeletionUnavailable));
    }

    #[tokio::test(start_paused = true)]
    async fn worker_stops_when_queue_is_dropped() {
        let repo = Arc::new(RecordingRepository::default());
        let (queue, worker) = DeletionWorker::new(Arc::clone(&repo), DeletionSettings::default());
        let handle = worker.spawn();

        queue.enqueue(task("u1", &["abc123"])).await.unwrap();
        drop(queue);

        handle.shutdown().await;
        assert_eq!(repo.calls(), vec![task("u1", &["abc123"])]);
    }
}
