//! API Module
//!
//! HTTP handlers and routing for the operator API.
//!
//! # Endpoints
//! - `PUT /cache` - Store a value
//! - `GET /cache/:key` - Read a value through both tiers
//! - `DELETE /cache/:key` - Delete a key from both tiers
//! - `POST /cache/invalidate` - Delete every key matching a pattern
//! - `GET /limits/:category/:identifier` - Peek at a caller's budget
//! - `POST /limits/:category/:identifier/check` - Consume one request
//! - `POST /limits/:category/:identifier/block` - Block a caller
//! - `DELETE /limits/:category/:identifier` - Reset one category
//! - `DELETE /clients/:identifier/limits` - Reset every category
//! - `GET /stats` - Cache and limiter statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use handlers::*;
pub use middleware::rate_limit;
pub use routes::create_router;
