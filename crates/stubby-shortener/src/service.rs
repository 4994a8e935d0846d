use crate::deletion::{DeletionQueue, DeletionTask};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use stubby_core::{
    BatchEntry, BatchItem, OwnedUrl, RequestContext, Repository, ShortCode, ShortenStatus,
    Shortened, Shortener, ShortenerError, Stats, UrlRecord,
};
use stubby_generator::Generator;
use tracing::{debug, info};
use url::Url;

/// Accepts absolute URLs that can be sent back verbatim in a `Location` header.
fn validate_url(original_url: &str) -> Result<(), ShortenerError> {
    if original_url.is_empty() {
        return Err(ShortenerError::MissingUrl);
    }
    // The parser silently drops tabs and newlines, so they are checked first.
    if original_url.chars().any(char::is_control) {
        return Err(ShortenerError::InvalidUrl(
            "contains control characters".to_string(),
        ));
    }
    Url::parse(original_url)
        .map(|_| ())
        .map_err(|e| ShortenerError::InvalidUrl(format!("{original_url}: {e}")))
}

/// A concrete implementation of the `Shortener` trait.
///
/// Codes are derived from the URL by the `Generator`, so a repeated request
/// from the same owner is detected with an existence check on
/// `(code, owner)` instead of a second insert. Deletions are handed to the
/// background pipeline through a [`DeletionQueue`].
#[derive(Debug, Clone)]
pub struct ShortenerService<R, G> {
    repository: Arc<R>,
    generator: G,
    base_url: String,
    deletions: DeletionQueue,
}

impl<R: Repository, G: Generator> ShortenerService<R, G> {
    pub fn new(
        repository: Arc<R>,
        generator: G,
        base_url: impl Into<String>,
        deletions: DeletionQueue,
    ) -> Self {
        Self {
            repository,
            generator,
            base_url: base_url.into(),
            deletions,
        }
    }

    fn short_url(&self, code: &ShortCode) -> String {
        code.to_url(&self.base_url)
    }
}

#[async_trait]
impl<R: Repository, G: Generator> Shortener for ShortenerService<R, G> {
    async fn shorten(
        &self,
        ctx: &RequestContext,
        original_url: &str,
    ) -> Result<Shortened, ShortenerError> {
        let owner = ctx.owner()?;
        validate_url(original_url)?;

        let code = self.generator.generate(original_url);
        let short_url = self.short_url(&code);

        if self.repository.exists(&code, owner).await? {
            debug!(%owner, %code, "url already shortened");
            return Ok(Shortened {
                short_url,
                status: ShortenStatus::AlreadyExists,
            });
        }

        self.repository
            .save(UrlRecord::new(code.clone(), original_url, owner.clone()))
            .await?;
        info!(%owner, %code, "shortened url");

        Ok(Shortened {
            short_url,
            status: ShortenStatus::Created,
        })
    }

    async fn shorten_batch(
        &self,
        ctx: &RequestContext,
        items: Vec<BatchItem>,
    ) -> Result<Vec<BatchEntry>, ShortenerError> {
        let owner = ctx.owner()?;
        for item in &items {
            validate_url(&item.original_url)?;
        }

        let mut entries = Vec::with_capacity(items.len());
        let mut fresh = Vec::new();
        let mut seen = HashSet::new();

        for item in items {
            let code = self.generator.generate(&item.original_url);
            entries.push(BatchEntry {
                correlation_id: item.correlation_id,
                short_url: self.short_url(&code),
            });

            if !seen.insert(code.clone()) {
                continue;
            }
            if !self.repository.exists(&code, owner).await? {
                fresh.push(UrlRecord::new(code, item.original_url, owner.clone()));
            }
        }

        if !fresh.is_empty() {
            let created = fresh.len();
            self.repository.save_batch(fresh).await?;
            info!(%owner, created, total = entries.len(), "shortened url batch");
        }

        Ok(entries)
    }

    async fn resolve(&self, code: &ShortCode) -> Result<String, ShortenerError> {
        match self.repository.get(code).await? {
            Some(record) if record.deleted => Err(ShortenerError::Gone(code.to_string())),
            Some(record) => Ok(record.original_url),
            None => Err(ShortenerError::NotFound(code.to_string())),
        }
    }

    async fn list_owned(&self, ctx: &RequestContext) -> Result<Vec<OwnedUrl>, ShortenerError> {
        let owner = ctx.owner()?;
        let records = self.repository.list_by_owner(owner).await?;

        Ok(records
            .into_iter()
            .map(|record| OwnedUrl {
                short_url: self.short_url(&record.short_code),
                original_url: record.original_url,
            })
            .collect())
    }

    async fn delete(
        &self,
        ctx: &RequestContext,
        codes: Vec<ShortCode>,
    ) -> Result<(), ShortenerError> {
        let owner = ctx.owner()?;
        self.deletions
            .enqueue(DeletionTask::new(owner.clone(), codes))
            .await
    }

    async fn ping(&self) -> Result<(), ShortenerError> {
        Ok(self.repository.ping().await?)
    }

    async fn stats(&self) -> Result<Stats, ShortenerError> {
        Ok(self.repository.stats().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deletion::{DeletionSettings, DeletionWorker};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use stubby_core::repository::Result as StorageResult;
    use stubby_core::{OwnerId, ReadRepository, StorageError};
    use stubby_generator::Sha256Generator;
    use stubby_storage::InMemoryRepository;

    const BASE_URL: &str = "http://localhost:8080";

    struct Fixture {
        repo: Arc<InMemoryRepository>,
        service: ShortenerService<InMemoryRepository, Sha256Generator>,
        worker: Option<DeletionWorker<InMemoryRepository>>,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(InMemoryRepository::new());
        let (queue, worker) = DeletionWorker::new(Arc::clone(&repo), DeletionSettings::default());
        let service = ShortenerService::new(Arc::clone(&repo), Sha256Generator::new(), BASE_URL, queue);
        Fixture {
            repo,
            service,
            worker: Some(worker),
        }
    }

    fn ctx(owner: &str) -> RequestContext {
        RequestContext::for_owner(OwnerId::new(owner).unwrap())
    }

    fn code(s: &str) -> ShortCode {
        ShortCode::new(s).unwrap()
    }

    #[tokio::test]
    async fn shorten_creates_then_reports_existing() {
        let f = fixture();

        let first = f.service.shorten(&ctx("u1"), "https://yandex.ru").await.unwrap();
        assert_eq!(first.short_url, "http://localhost:8080/FgAJzm");
        assert!(first.is_created());

        let second = f.service.shorten(&ctx("u1"), "https://yandex.ru").await.unwrap();
        assert_eq!(second.short_url, first.short_url);
        assert_eq!(second.status, ShortenStatus::AlreadyExists);
        assert_eq!(f.repo.len(), 1);
    }

    #[tokio::test]
    async fn shorten_is_scoped_per_owner() {
        let f = fixture();

        let a = f.service.shorten(&ctx("u1"), "https://ya.ru").await.unwrap();
        let b = f.service.shorten(&ctx("u2"), "https://ya.ru").await.unwrap();

        assert!(a.is_created());
        assert!(b.is_created());
        assert_eq!(a.short_url, b.short_url);
        assert_eq!(f.repo.len(), 2);
    }

    #[tokio::test]
    async fn shorten_requires_identity_and_url() {
        let f = fixture();

        let err = f
            .service
            .shorten(&RequestContext::anonymous(), "https://ya.ru")
            .await
            .unwrap_err();
        assert!(matches!(err, ShortenerError::IdentityMissing));

        let err = f.service.shorten(&ctx("u1"), "").await.unwrap_err();
        assert!(matches!(err, ShortenerError::MissingUrl));
        assert!(f.repo.is_empty());
    }

    #[tokio::test]
    async fn shorten_rejects_urls_that_cannot_be_redirected_to() {
        let f = fixture();

        for url in ["https://example.com/a\nb", "https://example.com/\u{7f}", "example.com", "not a url"] {
            let err = f.service.shorten(&ctx("u1"), url).await.unwrap_err();
            assert!(matches!(err, ShortenerError::InvalidUrl(_)), "{url:?}: {err}");
        }
        assert!(f.repo.is_empty());
    }

    #[tokio::test]
    async fn batch_preserves_order_and_saves_only_new_records() {
        let f = fixture();
        f.service.shorten(&ctx("u1"), "https://ya.ru").await.unwrap();

        let entries = f
            .service
            .shorten_batch(
                &ctx("u1"),
                vec![
                    BatchItem {
                        correlation_id: "1".into(),
                        original_url: "https://yandex.ru".into(),
                    },
                    BatchItem {
                        correlation_id: "2".into(),
                        original_url: "https://ya.ru".into(),
                    },
                    BatchItem {
                        correlation_id: "3".into(),
                        original_url: "https://yandex.ru".into(),
                    },
                ],
            )
            .await
            .unwrap();

        let ids: Vec<_> = entries.iter().map(|e| e.correlation_id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
        assert_eq!(entries[0].short_url, "http://localhost:8080/FgAJzm");
        assert_eq!(entries[1].short_url, "http://localhost:8080/fpCk-c");
        assert_eq!(entries[2].short_url, entries[0].short_url);
        assert_eq!(f.repo.len(), 2);
    }

    #[tokio::test]
    async fn batch_with_missing_url_stores_nothing() {
        let f = fixture();

        let err = f
            .service
            .shorten_batch(
                &ctx("u1"),
                vec![
                    BatchItem {
                        correlation_id: "1".into(),
                        original_url: "https://yandex.ru".into(),
                    },
                    BatchItem {
                        correlation_id: "2".into(),
                        original_url: String::new(),
                    },
                ],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ShortenerError::MissingUrl));
        assert!(f.repo.is_empty());

        let err = f
            .service
            .shorten_batch(
                &ctx("u1"),
                vec![
                    BatchItem {
                        correlation_id: "1".into(),
                        original_url: "https://yandex.ru".into(),
                    },
                    BatchItem {
                        correlation_id: "2".into(),
                        original_url: "https://ya.ru/\tx".into(),
                    },
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ShortenerError::InvalidUrl(_)));
        assert!(f.repo.is_empty());
    }

    #[tokio::test]
    async fn empty_batch_returns_empty_response() {
        let f = fixture();
        let entries = f.service.shorten_batch(&ctx("u1"), Vec::new()).await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn resolve_live_gone_and_missing() {
        let mut f = fixture();
        f.service.shorten(&ctx("u1"), "https://ya.ru").await.unwrap();
        assert_eq!(f.service.resolve(&code("fpCk-c")).await.unwrap(), "https://ya.ru");

        let err = f.service.resolve(&code("zzzzzz")).await.unwrap_err();
        assert!(matches!(err, ShortenerError::NotFound(_)));

        let handle = f.worker.take().unwrap().spawn();
        f.service
            .delete(&ctx("u1"), vec![code("fpCk-c")])
            .await
            .unwrap();
        handle.shutdown().await;

        let err = f.service.resolve(&code("fpCk-c")).await.unwrap_err();
        assert!(matches!(err, ShortenerError::Gone(_)));
    }

    #[tokio::test]
    async fn delete_only_affects_callers_records() {
        let mut f = fixture();
        f.service.shorten(&ctx("u1"), "https://ya.ru").await.unwrap();
        f.service.shorten(&ctx("u2"), "https://ya.ru").await.unwrap();

        let handle = f.worker.take().unwrap().spawn();
        f.service
            .delete(&ctx("u1"), vec![code("fpCk-c")])
            .await
            .unwrap();
        handle.shutdown().await;

        assert!(f.service.list_owned(&ctx("u1")).await.unwrap().is_empty());
        assert_eq!(f.service.list_owned(&ctx("u2")).await.unwrap().len(), 1);
        assert_eq!(f.service.resolve(&code("fpCk-c")).await.unwrap(), "https://ya.ru");

        // The tombstone still blocks re-creation for u1.
        let again = f.service.shorten(&ctx("u1"), "https://ya.ru").await.unwrap();
        assert_eq!(again.status, ShortenStatus::AlreadyExists);
    }

    #[tokio::test]
    async fn delete_without_identity_leaves_queue_untouched() {
        let f = fixture();

        let err = f
            .service
            .delete(&RequestContext::anonymous(), vec![code("fpCk-c")])
            .await
            .unwrap_err();

        assert!(matches!(err, ShortenerError::IdentityMissing));
        assert_eq!(f.service.deletions.available(), 10);
    }

    #[tokio::test]
    async fn delete_after_shutdown_is_unavailable() {
        let mut f = fixture();
        f.worker.take().unwrap().spawn().shutdown().await;

        let err = f
            .service
            .delete(&ctx("u1"), vec![code("fpCk-c")])
            .await
            .unwrap_err();
        assert!(matches!(err, ShortenerError::DeletionUnavailable));
    }

    #[tokio::test]
    async fn list_owned_formats_short_urls() {
        let f = fixture();
        f.service.shorten(&ctx("u1"), "https://yandex.ru").await.unwrap();

        let owned = f.service.list_owned(&ctx("u1")).await.unwrap();
        assert_eq!(
            owned,
            vec![OwnedUrl {
                short_url: "http://localhost:8080/FgAJzm".into(),
                original_url: "https://yandex.ru".into(),
            }]
        );
    }

    #[tokio::test]
    async fn passthroughs_reach_storage() {
        let f = fixture();
        f.service.shorten(&ctx("u1"), "https://ya.ru").await.unwrap();
        f.service.shorten(&ctx("u2"), "https://ya.ru").await.unwrap();

        let stats = f.service.stats().await.unwrap();
        assert_eq!(stats, Stats { urls: 2, users: 2 });
        assert_eq!(stats, f.repo.stats().await.unwrap());

        let err = f.service.ping().await.unwrap_err();
        assert!(matches!(
            err,
            ShortenerError::Storage(StorageError::Unavailable(_))
        ));
    }

    /// Storage double whose reads and writes fail on demand.
    #[derive(Default)]
    struct FailingRepository {
        fail_exists: bool,
        fail_save: bool,
        saves: AtomicUsize,
    }

    fn down() -> StorageError {
        StorageError::Unavailable("storage is down".to_string())
    }

    #[async_trait]
    impl ReadRepository for FailingRepository {
        async fn get(&self, _code: &ShortCode) -> StorageResult<Option<UrlRecord>> {
            Err(down())
        }

        async fn exists(&self, _code: &ShortCode, _owner: &OwnerId) -> StorageResult<bool> {
            if self.fail_exists {
                return Err(down());
            }
            Ok(false)
        }

        async fn list_by_owner(&self, _owner: &OwnerId) -> StorageResult<Vec<UrlRecord>> {
            Err(down())
        }

        async fn stats(&self) -> StorageResult<Stats> {
            Err(down())
        }

        async fn ping(&self) -> StorageResult<()> {
            Err(down())
        }
    }

    #[async_trait]
    impl Repository for FailingRepository {
        async fn save(&self, record: UrlRecord) -> StorageResult<()> {
            self.save_batch(vec![record]).await
        }

        async fn save_batch(&self, _records: Vec<UrlRecord>) -> StorageResult<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            if self.fail_save {
                return Err(down());
            }
            Ok(())
        }

        async fn delete_batch(&self, _codes: &[ShortCode], _owner: &OwnerId) -> StorageResult<u64> {
            Err(down())
        }
    }

    fn failing_service(
        repo: FailingRepository,
    ) -> (
        Arc<FailingRepository>,
        ShortenerService<FailingRepository, Sha256Generator>,
    ) {
        let repo = Arc::new(repo);
        let (queue, _worker) = DeletionWorker::new(Arc::clone(&repo), DeletionSettings::default());
        let service = ShortenerService::new(Arc::clone(&repo), Sha256Generator::new(), BASE_URL, queue);
        (repo, service)
    }

    fn batch() -> Vec<BatchItem> {
        vec![
            BatchItem {
                correlation_id: "1".into(),
                original_url: "https://yandex.ru".into(),
            },
            BatchItem {
                correlation_id: "2".into(),
                original_url: "https://ya.ru".into(),
            },
        ]
    }

    #[tokio::test]
    async fn failed_existence_check_is_a_storage_error() {
        let (repo, service) = failing_service(FailingRepository {
            fail_exists: true,
            ..Default::default()
        });

        let err = service.shorten(&ctx("u1"), "https://ya.ru").await.unwrap_err();
        assert!(matches!(err, ShortenerError::Storage(StorageError::Unavailable(_))));

        let err = service.shorten_batch(&ctx("u1"), batch()).await.unwrap_err();
        assert!(matches!(err, ShortenerError::Storage(StorageError::Unavailable(_))));
        assert_eq!(repo.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_save_fails_the_whole_request() {
        let (repo, service) = failing_service(FailingRepository {
            fail_save: true,
            ..Default::default()
        });

        let err = service.shorten(&ctx("u1"), "https://ya.ru").await.unwrap_err();
        assert!(matches!(err, ShortenerError::Storage(StorageError::Unavailable(_))));

        // One save_batch call for the batch, and no entries come back.
        let result = service.shorten_batch(&ctx("u1"), batch()).await;
        assert!(matches!(
            result,
            Err(ShortenerError::Storage(StorageError::Unavailable(_)))
        ));
        assert_eq!(repo.saves.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn read_failures_surface_from_resolve_and_list() {
        let (_repo, service) = failing_service(FailingRepository::default());

        assert!(matches!(
            service.resolve(&code("fpCk-c")).await.unwrap_err(),
            ShortenerError::Storage(_)
        ));
        assert!(matches!(
            service.list_owned(&ctx("u1")).await.unwrap_err(),
            ShortenerError::Storage(_)
        ));
    }
}
