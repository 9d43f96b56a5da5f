//! Cache Shield - two-tier object cache and category rate limiter
//!
//! A bounded in-memory tier in front of a durable SQLite tier, with TTL
//! expiry, promotion and read-through population, plus fixed-window rate
//! limiting with escalating blocks.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod keys;
pub mod limiter;
pub mod models;
pub mod services;
pub mod tasks;

pub use api::{create_router, AppState};
pub use cache::CacheStore;
pub use config::Config;
pub use error::{CacheError, RateLimited};
pub use limiter::{Category, RateLimiter};
pub use services::Services;
