use serde::{Deserialize, Serialize};

pub use stubby_core::{BatchEntry, BatchItem, OwnedUrl, Stats};

#[derive(Debug, Deserialize)]
pub struct ShortenRequest {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShortenResponse {
    pub result: String,
}
