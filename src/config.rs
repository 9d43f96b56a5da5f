//! Configuration Module
//!
//! Handles loading and managing configuration from environment variables.
//! The rate-limit category table is static and lives in `limiter::policy`.

use std::env;
use std::str::FromStr;

/// Path value that keeps the durable tier in memory only.
pub const IN_MEMORY_DURABLE: &str = ":memory:";

/// Runtime configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the memory tier can hold
    pub max_entries: usize,
    /// Default TTL in seconds for entries without explicit TTL
    pub default_ttl: u64,
    /// Cache expiry sweep interval in seconds
    pub cleanup_interval: u64,
    /// Rate-limiter sweep interval in seconds
    pub limiter_sweep_interval: u64,
    /// Size of the rolling get-latency sample
    pub latency_samples: usize,
    /// SQLite file backing the durable tier
    pub durable_path: String,
    /// Pending durable writes before new ones are dropped
    pub mirror_queue: usize,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_ENTRIES` - Maximum memory-tier entries (default: 10000)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `CLEANUP_INTERVAL` - Cache sweep frequency in seconds (default: 60)
    /// - `LIMITER_SWEEP_INTERVAL` - Limiter sweep frequency in seconds (default: 60)
    /// - `LATENCY_SAMPLES` - Latency samples kept for stats (default: 1000)
    /// - `DURABLE_PATH` - SQLite path, `:memory:` to disable persistence (default: cache_shield.db)
    /// - `MIRROR_QUEUE` - Durable write queue size (default: 4096)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: env_or("MAX_ENTRIES", defaults.max_entries),
            default_ttl: env_or("DEFAULT_TTL", defaults.default_ttl),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            limiter_sweep_interval: env_or(
                "LIMITER_SWEEP_INTERVAL",
                defaults.limiter_sweep_interval,
            ),
            latency_samples: env_or("LATENCY_SAMPLES", defaults.latency_samples),
            durable_path: env::var("DURABLE_PATH").unwrap_or(defaults.durable_path),
            mirror_queue: env_or("MIRROR_QUEUE", defaults.mirror_queue),
            server_port: env_or("SERVER_PORT", defaults.server_port),
        }
    }

    pub fn durable_in_memory(&self) -> bool {
        self.durable_path == IN_MEMORY_DURABLE
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            default_ttl: 300,
            cleanup_interval: 60,
            limiter_sweep_interval: 60,
            latency_samples: 1000,
            durable_path: "cache_shield.db".to_string(),
            mirror_queue: 4096,
            server_port: 3000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_entries, 10_000);
        assert_eq!(config.default_ttl, 300);
        assert_eq!(config.cleanup_interval, 60);
        assert_eq!(config.limiter_sweep_interval, 60);
        assert_eq!(config.latency_samples, 1000);
        assert_eq!(config.server_port, 3000);
        assert!(!config.durable_in_memory());
    }

    #[test]
    fn test_config_from_env_overrides() {
        env::set_var("LATENCY_SAMPLES", "250");
        env::set_var("MIRROR_QUEUE", "not-a-number");

        let config = Config::from_env();
        assert_eq!(config.latency_samples, 250);
        assert_eq!(config.mirror_queue, 4096);

        env::remove_var("LATENCY_SAMPLES");
        env::remove_var("MIRROR_QUEUE");
    }
}
