//! Rate Limiter Module
//!
//! Per-identifier, per-category fixed-window throttling with escalating
//! blocks, plus a guard that wraps operations with a limit check.

mod entry;
mod guard;
mod policy;
mod rate_limiter;

#[cfg(test)]
mod property_tests;

pub use entry::{retry_after_secs, LimitDecision, RateLimitEntry};
pub use guard::RateLimited;
pub use policy::{Category, Policy, PolicyTable, UnknownCategory};
pub use rate_limiter::{LimiterStats, RateLimiter};
