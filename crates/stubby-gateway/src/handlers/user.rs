use crate::error::Result;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use stubby_core::{RequestContext, ShortCode};

pub async fn list_user_urls_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response> {
    let urls = state.shortener().list_owned(&ctx).await?;

    if urls.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(urls).into_response())
}

/// Accepts a JSON array of codes and schedules their deletion.
pub async fn delete_user_urls_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    payload: std::result::Result<Json<Vec<String>>, JsonRejection>,
) -> Result<StatusCode> {
    let Json(raw) = payload?;
    let codes = raw
        .into_iter()
        .map(ShortCode::new)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    state.shortener().delete(&ctx, codes).await?;
    Ok(StatusCode::ACCEPTED)
}
