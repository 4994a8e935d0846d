use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;

use crate::auth::identity_middleware;
use crate::handlers::{
    delete_user_urls_handler, list_user_urls_handler, ping_handler, redirect_handler,
    shorten_batch_handler, shorten_json_handler, shorten_text_handler, stats_handler,
};
use crate::state::AppState;
use crate::subnet::trusted_subnet_guard;

pub struct App {}

impl App {
    pub fn router(state: AppState) -> Router {
        let internal = Router::new()
            .route("/api/internal/stats", get(stats_handler))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                trusted_subnet_guard,
            ));

        Router::new()
            .route("/", post(shorten_text_handler))
            .route("/ping", get(ping_handler))
            .route("/{id}", get(redirect_handler))
            .route("/api/shorten", post(shorten_json_handler))
            .route("/api/shorten/batch", post(shorten_batch_handler))
            .route(
                "/api/user/urls",
                get(list_user_urls_handler).delete(delete_user_urls_handler),
            )
            .merge(internal)
            .layer(middleware::from_fn(identity_middleware))
            .layer(CompressionLayer::new().gzip(true))
            .layer(RequestDecompressionLayer::new().gzip(true))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}
