mod health;
mod internal;
mod url;
mod user;

pub use health::ping_handler;
pub use internal::stats_handler;
pub use url::{redirect_handler, shorten_batch_handler, shorten_json_handler, shorten_text_handler};
pub use user::{delete_user_urls_handler, list_user_urls_handler};

use axum::http::StatusCode;
use stubby_core::Shortened;

fn shorten_status(shortened: &Shortened) -> StatusCode {
    if shortened.is_created() {
        StatusCode::CREATED
    } else {
        StatusCode::CONFLICT
    }
}
