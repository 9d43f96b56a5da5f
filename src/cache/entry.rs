//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// == Write Strategy ==
/// Which write pattern populated an entry. Kept for observability only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WriteStrategy {
    /// Caller computed the value and wrote it back
    #[default]
    CacheAside,
    /// Value was produced by `get_or_set`
    ReadThrough,
}

impl WriteStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteStrategy::CacheAside => "cache_aside",
            WriteStrategy::ReadThrough => "read_through",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "read_through" => WriteStrategy::ReadThrough,
            _ => WriteStrategy::CacheAside,
        }
    }
}

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The stored value, opaque to the cache
    pub value: Value,
    /// Creation timestamp (Unix milliseconds), an age signal for eviction
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
    /// Successful reads served from this entry
    pub hit_count: u64,
    pub strategy: WriteStrategy,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry that lives for `ttl_seconds` from `now_ms`.
    pub fn new(value: Value, now_ms: u64, ttl_seconds: u64, strategy: WriteStrategy) -> Self {
        Self {
            value,
            created_at: now_ms,
            expires_at: now_ms.saturating_add(ttl_seconds.saturating_mul(1000)),
            hit_count: 0,
            strategy,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is visible only while `now < expires_at`; at the boundary it
    /// is already dead.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }

    /// Returns remaining TTL in milliseconds, 0 once expired.
    pub fn ttl_remaining_ms(&self, now_ms: u64) -> u64 {
        self.expires_at.saturating_sub(now_ms)
    }
}
