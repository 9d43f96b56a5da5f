//! API Handlers
//!
//! HTTP request handlers for the operator endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::CacheStore;
use crate::error::{CacheError, Result};
use crate::limiter::{Category, LimitDecision, RateLimiter};
use crate::models::{
    BlockRequest, DeleteResponse, GetResponse, HealthResponse, InvalidateRequest,
    InvalidateResponse, SetRequest, SetResponse, StatsResponse,
};
use crate::services::Services;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheStore>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(cache: Arc<CacheStore>, limiter: Arc<RateLimiter>) -> Self {
        Self { cache, limiter }
    }

    /// Shares the cache and limiter owned by running services.
    pub fn from_services(services: &Services) -> Self {
        Self::new(Arc::clone(&services.cache), Arc::clone(&services.limiter))
    }
}

fn parse_category(raw: &str) -> Result<Category> {
    raw.parse()
        .map_err(|err: crate::limiter::UnknownCategory| CacheError::InvalidRequest(err.to_string()))
}

/// Handler for PUT /cache
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    state.cache.set(&req.key, req.value, req.ttl).await?;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /cache/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    match state.cache.get(&key).await {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for DELETE /cache/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<DeleteResponse> {
    state.cache.delete(&key).await;
    Json(DeleteResponse::new(key))
}

/// Handler for POST /cache/invalidate
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    if req.pattern.is_empty() {
        return Err(CacheError::InvalidRequest(
            "Pattern cannot be empty".to_string(),
        ));
    }

    let removed = state.cache.delete_pattern(&req.pattern).await;
    Ok(Json(InvalidateResponse {
        pattern: req.pattern,
        removed,
    }))
}

/// Handler for GET /limits/:category/:identifier
///
/// Reports the caller's budget without consuming it.
pub async fn peek_handler(
    State(state): State<AppState>,
    Path((category, identifier)): Path<(String, String)>,
) -> Result<Json<LimitDecision>> {
    let category = parse_category(&category)?;
    Ok(Json(state.limiter.peek_limit(&identifier, category)))
}

/// Handler for POST /limits/:category/:identifier/check
pub async fn check_handler(
    State(state): State<AppState>,
    Path((category, identifier)): Path<(String, String)>,
) -> Result<Json<LimitDecision>> {
    let category = parse_category(&category)?;
    Ok(Json(state.limiter.check_limit(&identifier, category)))
}

/// Handler for POST /limits/:category/:identifier/block
pub async fn block_handler(
    State(state): State<AppState>,
    Path((category, identifier)): Path<(String, String)>,
    Json(req): Json<BlockRequest>,
) -> Result<Json<LimitDecision>> {
    let category = parse_category(&category)?;
    state.limiter.block(&identifier, category, req.duration_ms);
    Ok(Json(state.limiter.peek_limit(&identifier, category)))
}

/// Handler for DELETE /limits/:category/:identifier
pub async fn reset_handler(
    State(state): State<AppState>,
    Path((category, identifier)): Path<(String, String)>,
) -> Result<Json<LimitDecision>> {
    let category = parse_category(&category)?;
    state.limiter.reset(&identifier, Some(category));
    Ok(Json(state.limiter.peek_limit(&identifier, category)))
}

/// Handler for DELETE /clients/:identifier/limits
///
/// Restores full budget in every category.
pub async fn reset_all_handler(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Json<serde_json::Value> {
    state.limiter.reset(&identifier, None);
    Json(serde_json::json!({ "identifier": identifier, "reset": true }))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        cache: state.cache.stats().await,
        limiter: state.limiter.stats(),
    })
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
