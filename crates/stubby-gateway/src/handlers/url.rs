use super::shorten_status;
use crate::error::Result;
use crate::model::{BatchEntry, BatchItem, ShortenRequest, ShortenResponse};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Extension, Json};
use stubby_core::{RequestContext, ShortCode};

/// `POST /` with the URL as a plain-text body.
pub async fn shorten_text_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: String,
) -> Result<Response> {
    let shortened = state.shortener().shorten(&ctx, body.trim()).await?;

    Ok((
        shorten_status(&shortened),
        [(CONTENT_TYPE, "text/plain")],
        shortened.short_url,
    )
        .into_response())
}

pub async fn shorten_json_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    payload: std::result::Result<Json<ShortenRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = payload?;
    let shortened = state.shortener().shorten(&ctx, request.url.trim()).await?;
    let status = shorten_status(&shortened);

    Ok((
        status,
        Json(ShortenResponse {
            result: shortened.short_url,
        }),
    )
        .into_response())
}

pub async fn shorten_batch_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    payload: std::result::Result<Json<Vec<BatchItem>>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<BatchEntry>>)> {
    let Json(items) = payload?;
    let entries = state.shortener().shorten_batch(&ctx, items).await?;
    Ok((StatusCode::CREATED, Json(entries)))
}

pub async fn redirect_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Redirect> {
    let code = ShortCode::new(id)?;
    let original_url = state.shortener().resolve(&code).await?;
    Ok(Redirect::temporary(&original_url))
}
