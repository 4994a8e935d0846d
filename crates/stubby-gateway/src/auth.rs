//! Caller identity for HTTP requests.
//!
//! The caller id travels in the `token` cookie or an
//! `Authorization: Bearer <id>` header. Callers without one are issued a
//! fresh id, returned as an `HttpOnly` cookie.

use crate::error::Result;
use axum::extract::Request;
use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use stubby_core::{OwnerId, RequestContext, ShortenerError};
use tracing::{debug, warn};
use uuid::Uuid;

pub const TOKEN_COOKIE: &str = "token";

const BEARER: &str = "bearer";

fn token_from_cookies(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == TOKEN_COOKIE && !value.is_empty())
        .map(|(_, value)| value)
}

/// Extracts the token of an `Authorization: Bearer <token>` value.
pub(crate) fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case(BEARER) && !token.is_empty()).then_some(token)
}

fn token_from_authorization(headers: &HeaderMap) -> Option<&str> {
    bearer_token(headers.get(AUTHORIZATION)?.to_str().ok()?)
}

/// Returns the caller id carried by the request, if any.
pub fn caller_id(headers: &HeaderMap) -> Option<OwnerId> {
    token_from_cookies(headers)
        .or_else(|| token_from_authorization(headers))
        .and_then(|token| OwnerId::new(token).ok())
}

fn session_cookie(owner: &OwnerId) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("{TOKEN_COOKIE}={owner}; Path=/; HttpOnly")).ok()
}

/// Attaches a [`RequestContext`] to every request, issuing an identity when needed.
pub async fn identity_middleware(mut request: Request, next: Next) -> Result<Response> {
    let (owner, issued) = match caller_id(request.headers()) {
        Some(owner) => (owner, false),
        None => {
            let owner =
                OwnerId::new(Uuid::new_v4().to_string()).map_err(ShortenerError::from)?;
            debug!(%owner, "issued caller identity");
            (owner, true)
        }
    };

    request
        .extensions_mut()
        .insert(RequestContext::for_owner(owner.clone()));

    let mut response = next.run(request).await;

    if issued {
        match session_cookie(&owner) {
            Some(cookie) => {
                response.headers_mut().append(SET_COOKIE, cookie);
            }
            None => warn!(%owner, "caller id is not a valid cookie value"),
        }
    }

    Ok(response)
}
