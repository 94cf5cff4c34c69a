//! Error types for wbs-ss
//!
//! Every handler returns [`ApiResult`]; engine errors map onto HTTP status
//! codes here and nowhere else.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Downstream collaborator failed (502)
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// wbs-common error
    #[error("Common error: {0}")]
    Common(#[from] wbs_common::Error),
}

impl ApiError {
    fn parts(self) -> (StatusCode, &'static str, String, bool) {
        use wbs_common::Error as E;
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, false),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "DELIVERY_FAILED", msg, true),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
                false,
            ),
            ApiError::Common(err) => {
                let retryable = err.is_retryable();
                let message = err.to_string();
                let (status, code) = match err {
                    E::Busy { .. } => (StatusCode::SERVICE_UNAVAILABLE, "BUSY"),
                    E::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                    E::InvalidState(_) => (StatusCode::CONFLICT, "INVALID_STATE"),
                    E::InvalidInput(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
                    E::Delivery(_) => (StatusCode::BAD_GATEWAY, "DELIVERY_FAILED"),
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, "COMMON_ERROR"),
                };
                (status, code, message, retryable)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, retryable) = self.parts();

        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), code = error_code, "{}", message);
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
                "retryable": retryable,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
