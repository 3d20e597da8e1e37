//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use engine::{EngineError, ErrorKind};

/// API-level error type that maps to HTTP responses.
///
/// Every error body has the form `{"code": "...", "error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    /// No or unusable caller identity.
    Unauthorized(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Engine error.
    Engine(EngineError),
}

impl ApiError {
    fn status(kind: ErrorKind) -> StatusCode {
        match kind {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Validation | ErrorKind::Security => StatusCode::BAD_REQUEST,
            ErrorKind::ExternalService => StatusCode::BAD_GATEWAY,
            ErrorKind::Integrity | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Engine(err) => {
                let kind = err.kind();
                let status = Self::status(kind);
                if status.is_server_error() {
                    tracing::error!(error = %err, code = err.code(), "request failed");
                }
                // Storage details stay in the log.
                let message = if kind == ErrorKind::Internal {
                    "Internal server error".to_string()
                } else {
                    err.to_string()
                };
                (status, err.code(), message)
            }
        };

        let body = serde_json::json!({ "code": code, "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}
