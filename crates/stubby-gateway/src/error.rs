use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use stubby_core::{CoreError, ShortenerError};
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Shortener(#[from] ShortenerError),
    #[error("invalid request body: {0}")]
    InvalidBody(#[from] JsonRejection),
    #[error("trusted subnet is not configured")]
    SubnetNotConfigured,
    #[error("client address is outside the trusted subnet")]
    UntrustedClient,
}

impl From<CoreError> for AppError {
    fn from(error: CoreError) -> Self {
        AppError::Shortener(error.into())
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Shortener(error) => match error {
                ShortenerError::IdentityMissing => StatusCode::UNAUTHORIZED,
                ShortenerError::MissingUrl
                | ShortenerError::InvalidUrl(_)
                | ShortenerError::InvalidShortCode(_)
                | ShortenerError::NotFound(_) => StatusCode::BAD_REQUEST,
                ShortenerError::Gone(_) => StatusCode::GONE,
                ShortenerError::DeletionUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                ShortenerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            AppError::SubnetNotConfigured => StatusCode::UNAUTHORIZED,
            AppError::UntrustedClient => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, "request failed");
            let message = status.canonical_reason().unwrap_or("internal error");
            return (status, message).into_response();
        }

        (status, self.to_string()).into_response()
    }
}
