//! Rate-Limit Middleware
//!
//! Counts every request against the `public` category for the caller named
//! by the `x-client-id` header before it reaches a handler.

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::handlers::AppState;
use crate::error::CacheError;
use crate::limiter::Category;

pub const CLIENT_ID_HEADER: &str = "x-client-id";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
const ANONYMOUS: &str = "anonymous";

/// Rejects over-budget callers with 429 and `Retry-After`; otherwise
/// forwards the request and reports the remaining budget.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let identifier = request
        .headers()
        .get(CLIENT_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .unwrap_or(ANONYMOUS)
        .to_string();

    match state.limiter.enforce(&identifier, Category::Public) {
        Ok(decision) => {
            let mut response = next.run(request).await;
            response
                .headers_mut()
                .insert(REMAINING_HEADER, HeaderValue::from(decision.remaining));
            response
        }
        Err(limited) => {
            debug!(identifier, "request rejected by rate limit");
            CacheError::from(limited).into_response()
        }
    }
}
