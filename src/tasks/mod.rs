//! Background Tasks Module
//!
//! Periodic sweeps that run for the lifetime of the services.
//!
//! # Tasks
//! - Cache sweep: removes expired entries from both cache tiers
//! - Limiter sweep: drops idle, unblocked rate-limit windows

mod sweep;

pub use sweep::{spawn_cache_sweep, spawn_limiter_sweep};
