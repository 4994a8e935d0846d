use crate::identity::RequestContext;
use crate::repository::Stats;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

type Result<T> = std::result::Result<T, crate::error::ShortenerError>;

/// Whether a shorten call created a record or found an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortenStatus {
    /// A new record was stored.
    Created,
    /// The caller already had a record for this URL; nothing was stored.
    AlreadyExists,
}

/// Result of shortening a single URL.
///
/// The short URL is usable in both cases; `status` tells the caller
/// whether it was freshly created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortened {
    pub short_url: String,
    pub status: ShortenStatus,
}

impl Shortened {
    pub fn is_created(&self) -> bool {
        self.status == ShortenStatus::Created
    }
}

/// One entry of a batch shorten request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub correlation_id: String,
    #[serde(default)]
    pub original_url: String,
}

/// One entry of a batch shorten response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub correlation_id: String,
    pub short_url: String,
}

/// A URL owned by the caller, as returned by [`Shortener::list_owned`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedUrl {
    pub short_url: String,
    pub original_url: String,
}

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Shortens a URL on behalf of the caller.
    async fn shorten(&self, ctx: &RequestContext, original_url: &str) -> Result<Shortened>;

    /// Shortens several URLs on behalf of the caller.
    ///
    /// The response has one entry per input item, in input order.
    async fn shorten_batch(
        &self,
        ctx: &RequestContext,
        items: Vec<BatchItem>,
    ) -> Result<Vec<BatchEntry>>;

    /// Resolves a short code to its original URL, regardless of owner.
    async fn resolve(&self, code: &ShortCode) -> Result<String>;

    /// Lists the caller's live short URLs.
    async fn list_owned(&self, ctx: &RequestContext) -> Result<Vec<OwnedUrl>>;

    /// Schedules deletion of the caller's short codes.
    ///
    /// Returns once the request is queued; the deletion itself happens
    /// in the background.
    async fn delete(&self, ctx: &RequestContext, codes: Vec<ShortCode>) -> Result<()>;

    /// Checks storage health.
    async fn ping(&self) -> Result<()>;

    /// Returns usage counters.
    async fn stats(&self) -> Result<Stats>;
}
