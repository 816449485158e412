//! HTTP error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dpp_ports::{SessionStoreError, TokenError};
use serde::Serialize;

/// HTTP result type alias.
pub type ApiResult<T> = Result<T, ApiError>;

/// HTTP-facing error types.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound { resource: String, id: String },
    /// Bad request (validation error).
    BadRequest { message: String },
    /// Bearer token rejected (expired or malformed/wrong signature).
    Unauthorized { reason: String },
    /// Internal server error.
    Internal { message: String },
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            ApiError::NotFound { resource, id } => (
                StatusCode::NOT_FOUND,
                format!("{resource} not found: {id}"),
            ),
            ApiError::BadRequest { message } => (StatusCode::BAD_REQUEST, message.clone()),
            ApiError::Unauthorized { reason } => (StatusCode::UNAUTHORIZED, reason.clone()),
            ApiError::Internal { message } => {
                tracing::error!(error = %message, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        let body = ErrorResponse {
            error,
            code: status.as_u16(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<SessionStoreError> for ApiError {
    fn from(e: SessionStoreError) -> Self {
        match e {
            SessionStoreError::NotFound { id } => ApiError::NotFound {
                resource: "session".to_string(),
                id: id.to_string(),
            },
            SessionStoreError::ConnectionError { message } => ApiError::Internal { message },
            SessionStoreError::SerializationError { message } => ApiError::Internal { message },
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => ApiError::Unauthorized {
                reason: "expired".to_string(),
            },
            TokenError::Invalid { reason } => ApiError::Unauthorized { reason },
        }
    }
}
