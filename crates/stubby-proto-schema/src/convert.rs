use crate::shortener::v1 as proto;
use stubby_core as core;
use stubby_core::{CoreError, ShortCode};

/// Reads a short code from either a bare code or a full short URL.
pub fn parse_short_code(value: &str) -> Result<ShortCode, CoreError> {
    let value = value.trim().trim_end_matches('/');
    let code = value.rsplit('/').next().unwrap_or(value);
    ShortCode::new(code)
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl From<proto::BatchItem> for core::BatchItem {
    fn from(item: proto::BatchItem) -> Self {
        Self {
            correlation_id: item.correlation_id,
            original_url: item.original_url,
        }
    }
}

impl From<core::BatchEntry> for proto::BatchEntry {
    fn from(entry: core::BatchEntry) -> Self {
        Self {
            correlation_id: entry.correlation_id,
            short_url: entry.short_url,
        }
    }
}

impl From<core::OwnedUrl> for proto::UserUrl {
    fn from(url: core::OwnedUrl) -> Self {
        Self {
            short_url: url.short_url,
            original_url: url.original_url,
        }
    }
}

impl From<core::Shortened> for proto::MakeUrlResponse {
    fn from(shortened: core::Shortened) -> Self {
        Self {
            created: shortened.is_created(),
            result: shortened.short_url,
        }
    }
}

impl From<core::Stats> for proto::GetStatsResponse {
    fn from(stats: core::Stats) -> Self {
        Self {
            urls: saturating_i64(stats.urls),
            users: saturating_i64(stats.users),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stubby_core::ShortenStatus;

    #[test]
    fn short_code_from_code_or_url() {
        let expected = ShortCode::new("fpCk-c").unwrap();
        assert_eq!(parse_short_code("fpCk-c").unwrap(), expected);
        assert_eq!(
            parse_short_code("http://localhost:8080/fpCk-c").unwrap(),
            expected
        );
        assert_eq!(
            parse_short_code(" http://localhost:8080/fpCk-c/ ").unwrap(),
            expected
        );
    }

    #[test]
    fn malformed_short_codes_are_rejected() {
        assert!(parse_short_code("").is_err());
        assert!(parse_short_code("http://localhost:8080/").is_err());
        assert!(parse_short_code("http://localhost:8080/too-long-code").is_err());
    }

    #[test]
    fn existing_url_is_not_reported_as_created() {
        let response: proto::MakeUrlResponse = core::Shortened {
            short_url: "http://localhost:8080/fpCk-c".into(),
            status: ShortenStatus::AlreadyExists,
        }
        .into();
        assert_eq!(response.result, "http://localhost:8080/fpCk-c");
        assert!(!response.created);
    }

    #[test]
    fn stats_saturate_instead_of_wrapping() {
        let response: proto::GetStatsResponse = core::Stats {
            urls: u64::MAX,
            users: 3,
        }
        .into();
        assert_eq!(response.urls, i64::MAX);
        assert_eq!(response.users, 3);
    }
}
