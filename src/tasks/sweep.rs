//! Expiry Sweeps
//!
//! Background tasks that periodically purge expired cache entries and stale
//! rate-limit windows. Each pass holds a lock for at most one full pass;
//! abort the returned handle to stop a sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheStore;
use crate::limiter::RateLimiter;

/// Spawns a task that sweeps both cache tiers every `interval`.
///
/// # Example
/// ```ignore
/// let handle = spawn_cache_sweep(cache.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_cache_sweep(cache: Arc<CacheStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting cache sweep with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let report = cache.sweep().await;
            if report.memory > 0 || report.durable > 0 {
                info!(
                    "Cache sweep: removed {} memory and {} durable expired entries",
                    report.memory, report.durable
                );
            } else {
                debug!("Cache sweep: no expired entries found");
            }
        }
    })
}

/// Spawns a task that drops stale rate-limit windows every `interval`.
pub fn spawn_limiter_sweep(limiter: Arc<RateLimiter>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting rate-limit sweep with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let removed = limiter.cleanup_expired();
            if removed > 0 {
                info!("Rate-limit sweep: removed {} stale windows", removed);
            } else {
                debug!("Rate-limit sweep: nothing to remove");
            }
        }
    })
}
