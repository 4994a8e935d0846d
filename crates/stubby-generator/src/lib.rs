pub mod sha256;

pub use sha256::Sha256Generator;

use stubby_core::ShortCode;

/// Trait for deriving short codes from original URLs.
///
/// Implementations are pure functions of their input and don't interact
/// with storage: the same URL must always produce the same code, which is
/// what lets the shortener detect an existing record with a plain
/// existence check.
pub trait Generator: Send + Sync + 'static {
    /// Derives the short code for `original_url`.
    fn generate(&self, original_url: &str) -> ShortCode;
}

impl<G: Generator> Generator for std::sync::Arc<G> {
    fn generate(&self, original_url: &str) -> ShortCode {
        (**self).generate(original_url)
    }
}
