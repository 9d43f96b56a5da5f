//! Cache Module
//!
//! Two-tier object cache: a bounded memory tier with FIFO-by-creation
//! eviction in front of a durable SQLite tier, with TTL expiry, promotion
//! and read-through population.

mod domain;
mod durable;
mod entry;
mod memory;
mod mirror;
mod stats;
mod store;


// Re-export public types
pub use domain::{PRODUCT_TTL, SEARCH_RESULTS_TTL, USER_PROFILE_TTL, WALLET_BALANCE_TTL};
pub use durable::{DurableResult, DurableTier, SqliteTier};
pub use entry::{CacheEntry, WriteStrategy};
pub use memory::MemoryTier;
pub use mirror::{Applied, DurableMirror};
pub use stats::{CacheStats, StatsCollector};
pub use store::{CacheStore, SweepReport};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
