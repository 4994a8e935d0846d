use crate::error::AppError;
use stubby_core::ShortenerError;
use tonic::Status;
use tracing::{debug, error};

const INTERNAL_MESSAGE: &str = "internal server error";

/// Maps a workflow error to the status returned to rpc callers.
///
/// Only a missing identity is told apart; every other failure is reported
/// as `Internal` without details.
pub(crate) fn status(error: ShortenerError) -> Status {
    match error {
        ShortenerError::IdentityMissing => Status::unauthenticated(error.to_string()),
        ShortenerError::Storage(_) | ShortenerError::DeletionUnavailable => {
            error!(error = %error, "rpc failed");
            Status::internal(INTERNAL_MESSAGE)
        }
        error => {
            debug!(error = %error, "rpc rejected");
            Status::internal(INTERNAL_MESSAGE)
        }
    }
}

/// Maps a trusted-subnet rejection.
pub(crate) fn guard_status(error: AppError) -> Status {
    match error {
        AppError::Shortener(error) => status(error),
        error => Status::permission_denied(error.to_string()),
    }
}
