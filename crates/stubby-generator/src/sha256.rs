use crate::Generator;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use stubby_core::ShortCode;

/// Content-addressed generator: SHA-256 of the URL bytes, URL-safe base64,
/// truncated to [`ShortCode::LENGTH`] characters.
///
/// The code space is 64^6. Two different URLs sharing a truncated digest
/// are not disambiguated.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Generator;

impl Sha256Generator {
    pub fn new() -> Self {
        Self
    }
}

impl Generator for Sha256Generator {
    fn generate(&self, original_url: &str) -> ShortCode {
        let digest = Sha256::digest(original_url.as_bytes());
        let mut encoded = URL_SAFE_NO_PAD.encode(digest);
        encoded.truncate(ShortCode::LENGTH);
        ShortCode::new_unchecked(encoded)
    }
}
