//! HTTP error bodies: `{"detail": "..."}` with a matching status code.

use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::QueryError;

/// Error returned by every gateway handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    detail: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }

    /// Map a query error, prefixing internal failures with `context`
    /// (e.g. `"Search error: ..."`).
    pub fn from_query(err: QueryError, context: &str) -> Self {
        match err {
            QueryError::NotFound { .. } => Self::not_found(err.to_string()),
            QueryError::InvalidQuery { reason } => Self::bad_request(reason),
            QueryError::Internal { message } => {
                tracing::error!(context, error = %message, "Request failed");
                Self::internal(format!("{} error: {}", context, message))
            }
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            detail: &self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Result type for gateway handlers.
pub type ApiResult<T> = Result<Json<T>, ApiError>;
