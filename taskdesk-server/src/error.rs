//! Error types for taskdesk-server
//!
//! Every error body is `{ "message": "<reason>" }`. Server-side failures are
//! logged with full detail and answered with a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use taskdesk_common::api::{AuthError, MessageResponse};
use thiserror::Error;
use tracing::error;

use crate::ingest::UploadError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not permitted (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Request body over the configured limit (413)
    #[error("Payload too large")]
    PayloadTooLarge,

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Token or password hashing failure
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Upload job failure
    #[error(transparent)]
    Upload(#[from] UploadError),

    /// taskdesk-common error
    #[error("Common error: {0}")]
    Common(#[from] taskdesk_common::Error),
}

/// Result type for handlers
pub type ApiResult<T> = Result<T, ApiError>;

const SERVER_ERROR: &str = "Server error";

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "Uploaded file is too large".to_string(),
            ),
            ApiError::Upload(err) => (err.status_code(), err.user_message().to_string()),
            ApiError::Common(taskdesk_common::Error::NotFound(msg)) => (StatusCode::NOT_FOUND, msg),
            ApiError::Common(taskdesk_common::Error::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, msg)
            }
            ref err @ (ApiError::Internal(_) | ApiError::Auth(_) | ApiError::Common(_)) => {
                error!(error = %err, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR.to_string())
            }
        };

        (status, Json(MessageResponse::new(message))).into_response()
    }
}
