//! Service-to-HTTP error translation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::services::ServiceError;

pub type ApiResult<T> = Result<T, ApiError>;

/// An HTTP error response as `{"error": "..."}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let (status, message) = match &err {
            ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
            ServiceError::Forbidden(_) => (StatusCode::FORBIDDEN, err.to_string()),
            ServiceError::NotAttached { .. } => (StatusCode::CONFLICT, err.to_string()),
            ServiceError::InvalidInput(_) => (StatusCode::BAD_REQUEST, err.to_string()),
            ServiceError::EmailTaken => (StatusCode::CONFLICT, err.to_string()),
            ServiceError::BadCredentials => (StatusCode::UNAUTHORIZED, err.to_string()),
            ServiceError::Storage(inner) => {
                // Detail stays in the log, not in the response body.
                error!(error = %inner, "storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
