use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use ipnetwork::IpNetwork;
use std::net::IpAddr;
use tracing::debug;

pub const REAL_IP_HEADER: &str = "x-real-ip";

fn real_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get(REAL_IP_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Checks the client address in `X-Real-IP` against the trusted subnet.
pub fn authorize(subnet: Option<&IpNetwork>, headers: &HeaderMap) -> Result<()> {
    let subnet = subnet.ok_or(AppError::SubnetNotConfigured)?;

    match real_ip(headers) {
        Some(ip) if subnet.contains(ip) => Ok(()),
        ip => {
            debug!(client = ?ip, %subnet, "rejected untrusted client");
            Err(AppError::UntrustedClient)
        }
    }
}

/// Route layer guarding internal endpoints.
pub async fn trusted_subnet_guard(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    authorize(state.trusted_subnet(), request.headers())?;
    Ok(next.run(request).await)
}
