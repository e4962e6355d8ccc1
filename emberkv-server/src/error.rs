//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use emberkv_cache::CacheError;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request parameters.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Key not present (or expired) on get.
    #[error("key not found: {0}")]
    NotFound(String),

    /// Cache or WAL failure.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, retryable) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, false),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, false),
            ApiError::Cache(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.is_retryable()),
        };

        let body = Json(json!({
            "error": self.to_string(),
            "retryable": retryable,
        }));

        (status, body).into_response()
    }
}
