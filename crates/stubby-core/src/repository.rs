use crate::error::StorageError;
use crate::identity::OwnerId;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A stored URL record in the repository.
///
/// Records are immutable once written, except for the `deleted` tombstone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// Unique identifier assigned at creation.
    pub id: Uuid,
    /// Code derived from `original_url`; unique per owner only.
    pub short_code: ShortCode,
    /// The original URL that was shortened.
    pub original_url: String,
    /// The caller who created the record.
    pub owner: OwnerId,
    /// Tombstone flag set by batch deletion.
    #[serde(default)]
    pub deleted: bool,
    /// When the record was created.
    pub created_at: Timestamp,
}

impl UrlRecord {
    /// Builds a live record with a fresh id.
    pub fn new(short_code: ShortCode, original_url: impl Into<String>, owner: OwnerId) -> Self {
        Self {
            id: Uuid::new_v4(),
            short_code,
            original_url: original_url.into(),
            owner,
            deleted: false,
            created_at: Timestamp::now(),
        }
    }
}

/// Usage counters reported by the storage backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Number of live (not deleted) records.
    pub urls: u64,
    /// Number of distinct owners with at least one live record.
    pub users: u64,
}

/// A read-only view of a repository.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Retrieves a record for the code, regardless of owner.
    ///
    /// A live record is preferred when several owners share the code; a
    /// tombstoned record is only returned when no live record exists.
    /// Returns `None` if the code was never stored.
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>>;

    /// Checks whether `owner` already has a record under `code`,
    /// tombstoned records included.
    async fn exists(&self, code: &ShortCode, owner: &OwnerId) -> Result<bool>;

    /// Lists the live records created by `owner`.
    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<UrlRecord>>;

    /// Returns usage counters.
    async fn stats(&self) -> Result<Stats>;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<()>;
}

#[async_trait]
pub trait Repository: ReadRepository {
    /// Persists a new record. Returns `Err(Conflict)` if `(owner, code)` is taken.
    async fn save(&self, record: UrlRecord) -> Result<()>;

    /// Persists several records atomically where the backend supports it.
    async fn save_batch(&self, records: Vec<UrlRecord>) -> Result<()>;

    /// Marks the owner's records under `codes` as deleted.
    /// Returns the number of records that were tombstoned by this call.
    async fn delete_batch(&self, codes: &[ShortCode], owner: &OwnerId) -> Result<u64>;
}
