use crate::error::Result;
use crate::model::Stats;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;

pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<Stats>> {
    Ok(Json(state.shortener().stats().await?))
}
