// HTTP response utilities: mapping service errors to status codes
use crate::application::error::ServiceError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Client errors carry their message; server faults are logged and sent opaque.
pub fn error_response(err: ServiceError) -> Response {
    match err {
        ServiceError::NotFound(what) => {
            (StatusCode::NOT_FOUND, format!("not found: {}", what)).into_response()
        }
        ServiceError::InvalidInput(message) => (StatusCode::BAD_REQUEST, message).into_response(),
        ServiceError::Classification(e) => {
            tracing::error!("failed to get condition level: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        ServiceError::Store(e) => {
            tracing::error!("db error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        error_response(self)
    }
}
