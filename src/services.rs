//! Services Module
//!
//! Explicitly constructed cache + limiter pair with a start/shutdown
//! lifecycle. Starting spawns both sweeps; shutdown stops them and flushes
//! pending durable writes.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::cache::{CacheStore, DurableTier, SqliteTier};
use crate::clock::{SharedClock, SystemClock};
use crate::config::Config;
use crate::error::Result;
use crate::limiter::{PolicyTable, RateLimiter};
use crate::tasks::{spawn_cache_sweep, spawn_limiter_sweep};

#[derive(Debug)]
pub struct Services {
    pub cache: Arc<CacheStore>,
    pub limiter: Arc<RateLimiter>,
    sweeps: Vec<JoinHandle<()>>,
}

impl Services {
    // == Start ==
    /// Opens the durable tier named by `config` and starts everything with
    /// the system clock and default category table.
    pub fn start(config: &Config) -> Result<Self> {
        let durable: Arc<dyn DurableTier> = if config.durable_in_memory() {
            Arc::new(SqliteTier::in_memory()?)
        } else {
            Arc::new(SqliteTier::open(&config.durable_path)?)
        };
        Ok(Self::start_with(
            config,
            durable,
            PolicyTable::default(),
            Arc::new(SystemClock),
        ))
    }

    pub fn start_with(
        config: &Config,
        durable: Arc<dyn DurableTier>,
        policies: PolicyTable,
        clock: SharedClock,
    ) -> Self {
        let cache = Arc::new(CacheStore::from_config(config, durable, Arc::clone(&clock)));
        let limiter = Arc::new(RateLimiter::with_policies(policies, clock));

        let sweeps = vec![
            spawn_cache_sweep(
                Arc::clone(&cache),
                Duration::from_secs(config.cleanup_interval.max(1)),
            ),
            spawn_limiter_sweep(
                Arc::clone(&limiter),
                Duration::from_secs(config.limiter_sweep_interval.max(1)),
            ),
        ];
        info!("cache and rate limiter started");

        Self {
            cache,
            limiter,
            sweeps,
        }
    }

    // == Shutdown ==
    /// Stops the sweeps and waits for queued durable writes.
    pub async fn shutdown(self) {
        for sweep in &self.sweeps {
            sweep.abort();
        }
        for sweep in self.sweeps {
            let _ = sweep.await;
        }
        self.cache.flush().await;
        info!("cache and rate limiter stopped");
    }
}
