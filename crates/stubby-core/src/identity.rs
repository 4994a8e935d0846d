use crate::error::{CoreError, ShortenerError};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Identity of the caller that owns a shortened URL.
///
/// The value is opaque: any non-empty string is accepted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if id.is_empty() {
            return Err(CoreError::EmptyOwnerId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for OwnerId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<OwnerId> for String {
    fn from(value: OwnerId) -> Self {
        value.0
    }
}

/// Request-scoped caller context handed to every workflow operation.
///
/// Transport layers build it after authenticating the caller; an
/// anonymous context makes every owner-scoped operation fail with
/// [`ShortenerError::IdentityMissing`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestContext {
    owner: Option<OwnerId>,
}

impl RequestContext {
    /// A context without an authenticated caller.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A context for an authenticated caller.
    pub fn for_owner(owner: OwnerId) -> Self {
        Self { owner: Some(owner) }
    }

    /// Returns the caller identity.
    pub fn owner(&self) -> Result<&OwnerId, ShortenerError> {
        self.owner.as_ref().ok_or(ShortenerError::IdentityMissing)
    }
}

impl From<OwnerId> for RequestContext {
    fn from(owner: OwnerId) -> Self {
        Self::for_owner(owner)
    }
}
