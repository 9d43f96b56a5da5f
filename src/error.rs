//! Error types for the cache and rate limiter
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

pub use crate::limiter::RateLimited;
use crate::models::ErrorResponse;

// == Durable Error ==
/// Failures of the durable (secondary) tier. Never surfaced by the
/// caller-facing cache operations; logged and degraded instead.
#[derive(Error, Debug)]
pub enum DurableError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

// == Cache Error Enum ==
/// Unified error type for the cache and limiter.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Caller is over budget for a category
    #[error(transparent)]
    RateLimited(#[from] RateLimited),

    /// Durable tier could not be opened
    #[error("Durable tier: {0}")]
    Durable(#[from] DurableError),

    /// Value could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) | CacheError::Serialization(_) => {
                StatusCode::BAD_REQUEST
            }
            CacheError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            CacheError::Durable(_) | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut body = ErrorResponse::new(self.to_string());
        if let CacheError::RateLimited(limited) = &self {
            body = body.with_retry_after(limited.retry_after_secs);
        }
        let retry_after = body.retry_after;

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

// == Result Type Alias ==
/// Convenience Result type for the crate.
pub type Result<T> = std::result::Result<T, CacheError>;
