//! Cache Store Module
//!
//! Two-tier cache engine: a bounded memory tier in front of a durable tier,
//! with promotion on durable hits, TTL expiry and read-through population.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, warn};

use crate::cache::{
    CacheEntry, CacheStats, DurableMirror, DurableTier, MemoryTier, StatsCollector, WriteStrategy,
    MAX_KEY_LENGTH,
};
use crate::clock::{SharedClock, SystemClock};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::keys::KeyPattern;

/// Memory tier and its counters share one lock so eviction decisions and
/// stats stay consistent.
#[derive(Debug)]
struct Inner {
    memory: MemoryTier,
    stats: StatsCollector,
}

enum MemoryRead {
    Hit(Value),
    Expired,
    Absent,
}

impl Inner {
    fn lookup(&mut self, key: &str, now_ms: u64) -> MemoryRead {
        let expired = match self.memory.get(key) {
            Some(entry) => entry.is_expired(now_ms),
            None => return MemoryRead::Absent,
        };
        if expired {
            self.memory.remove(key);
            return MemoryRead::Expired;
        }
        match self.memory.get_mut(key) {
            Some(entry) => {
                entry.hit_count += 1;
                MemoryRead::Hit(entry.value.clone())
            }
            None => MemoryRead::Absent,
        }
    }

    fn insert(&mut self, key: String, entry: CacheEntry) {
        if let Some(evicted) = self.memory.insert(key, entry) {
            debug!(key = %evicted, "evicted oldest entry from memory tier");
            self.stats.record_eviction();
        }
    }
}

/// Counts removed by one expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub memory: usize,
    pub durable: usize,
}

type InFlight = Mutex<HashMap<String, Arc<OnceCell<Value>>>>;

/// Drops a key's in-flight cell once its caller is done, including when the
/// caller's future is cancelled mid-producer.
struct InFlightGuard<'a> {
    in_flight: &'a InFlight,
    key: &'a str,
    cell: Arc<OnceCell<Value>>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock();
        if in_flight
            .get(self.key)
            .is_some_and(|current| Arc::ptr_eq(current, &self.cell))
        {
            in_flight.remove(self.key);
        }
    }
}

// == Invalidations ==
/// Tracks deletes, pattern deletes and clears so that a durable read or
/// read-through computation that overlapped one is never written into
/// memory afterwards.
///
/// The epoch moves when an invalidation starts and again when its durable
/// side has been applied; `pending` counts the ones still in progress.
#[derive(Debug, Default)]
struct Invalidations {
    epoch: AtomicU64,
    pending: AtomicUsize,
}

impl Invalidations {
    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Call with the memory-tier lock held.
    fn begin(&self) -> InvalidationGuard<'_> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.epoch.fetch_add(1, Ordering::SeqCst);
        InvalidationGuard { tracker: self }
    }

    /// No invalidation started or finished since `epoch` was read.
    fn is_current(&self, epoch: u64) -> bool {
        self.pending.load(Ordering::SeqCst) == 0 && self.epoch() == epoch
    }
}

struct InvalidationGuard<'a> {
    tracker: &'a Invalidations,
}

impl Drop for InvalidationGuard<'_> {
    fn drop(&mut self) {
        self.tracker.epoch.fetch_add(1, Ordering::SeqCst);
        self.tracker.pending.fetch_sub(1, Ordering::SeqCst);
    }
}

// == Cache Store ==
/// Two-tier cache. Share it behind an `Arc`; every method takes `&self`.
#[derive(Debug)]
pub struct CacheStore {
    inner: RwLock<Inner>,
    durable: Arc<dyn DurableTier>,
    mirror: DurableMirror,
    in_flight: InFlight,
    invalidations: Invalidations,
    clock: SharedClock,
    default_ttl: u64,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a store with the given capacity and default TTL in seconds.
    ///
    /// Spawns the durable writer, so it must run inside a tokio runtime.
    pub fn new(max_entries: usize, default_ttl: u64, durable: Arc<dyn DurableTier>) -> Self {
        let config = Config {
            max_entries,
            default_ttl,
            ..Config::default()
        };
        Self::from_config(&config, durable, Arc::new(SystemClock))
    }

    pub fn from_config(config: &Config, durable: Arc<dyn DurableTier>, clock: SharedClock) -> Self {
        Self {
            inner: RwLock::new(Inner {
                memory: MemoryTier::new(config.max_entries),
                stats: StatsCollector::new(config.latency_samples),
            }),
            mirror: DurableMirror::spawn(Arc::clone(&durable), config.mirror_queue),
            durable,
            in_flight: Mutex::new(HashMap::new()),
            invalidations: Invalidations::default(),
            clock,
            default_ttl: config.default_ttl,
        }
    }

    /// TTL in seconds applied when a write names none.
    pub fn default_ttl(&self) -> u64 {
        self.default_ttl
    }

    // == Get ==
    /// Looks up `key` in memory, then in the durable tier.
    ///
    /// A live durable hit is promoted into memory before it is returned.
    /// Expired entries read as misses and are purged from both tiers.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let started = Instant::now();
        let now = self.clock.now_ms();

        let (memory_read, epoch) = {
            let mut inner = self.inner.write().await;
            let read = inner.lookup(key, now);
            if let MemoryRead::Expired = read {
                self.mirror.discard(key.to_string());
            }
            (read, self.invalidations.epoch())
        };
        let found = match memory_read {
            MemoryRead::Hit(value) => Some(value),
            MemoryRead::Expired => None,
            MemoryRead::Absent => self.get_durable(key, now, epoch).await,
        };

        let mut inner = self.inner.write().await;
        if found.is_some() {
            inner.stats.record_hit();
        } else {
            inner.stats.record_miss();
        }
        inner
            .stats
            .record_latency(started.elapsed().as_secs_f64() * 1000.0);
        found
    }

    async fn get_durable(&self, key: &str, now: u64, epoch: u64) -> Option<Value> {
        let entry = match self.durable.get(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(err) => {
                warn!(key = %key, "durable lookup failed, treating as miss: {}", err);
                return None;
            }
        };

        let mut inner = self.inner.write().await;
        // A write that landed while the durable read was in flight wins.
        if let MemoryRead::Hit(current) = inner.lookup(key, now) {
            return Some(current);
        }
        if entry.is_expired(now) {
            self.mirror.discard(key.to_string());
            return None;
        }
        if !self.invalidations.is_current(epoch) {
            debug!(key = %key, "durable read overlapped an invalidation, not promoted");
            return Some(entry.value);
        }
        let value = entry.value.clone();
        let mut promoted = entry;
        promoted.hit_count += 1;
        inner.insert(key.to_string(), promoted);
        debug!(key = %key, "promoted durable hit into memory tier");
        Some(value)
    }

    // == Set ==
    /// Stores `value` under `key` as a cache-aside write.
    ///
    /// `ttl` is in seconds and falls back to the default TTL.
    pub async fn set(&self, key: &str, value: Value, ttl: Option<u64>) -> Result<()> {
        self.set_with_strategy(key, value, ttl, WriteStrategy::CacheAside)
            .await
    }

    pub async fn set_with_strategy(
        &self,
        key: &str,
        value: Value,
        ttl: Option<u64>,
        strategy: WriteStrategy,
    ) -> Result<()> {
        validate_key(key)?;

        let entry = self.build_entry(value, ttl, strategy);
        let mut inner = self.inner.write().await;
        inner.insert(key.to_string(), entry.clone());
        self.mirror.put(key.to_string(), entry).await;
        Ok(())
    }

    fn build_entry(&self, value: Value, ttl: Option<u64>, strategy: WriteStrategy) -> CacheEntry {
        let ttl = ttl.unwrap_or(self.default_ttl);
        CacheEntry::new(value, self.clock.now_ms(), ttl, strategy)
    }

    // == Delete ==
    /// Removes `key` from both tiers. Missing keys are a no-op.
    pub async fn delete(&self, key: &str) {
        let (_invalidation, applied) = {
            let mut inner = self.inner.write().await;
            inner.memory.remove(key);
            let invalidation = self.invalidations.begin();
            (invalidation, self.mirror.remove(key.to_string()).await)
        };
        applied.wait().await;
    }

    // == Delete Pattern ==
    /// Removes every key matching `pattern` (trailing `*` = prefix match).
    ///
    /// Returns how many entries left the memory tier; matching durable-only
    /// entries are removed as well.
    pub async fn delete_pattern(&self, pattern: &str) -> usize {
        let pattern = KeyPattern::parse(pattern);
        let (_invalidation, applied, removed) = {
            let mut inner = self.inner.write().await;
            let removed = inner.memory.remove_matching(&pattern);
            debug!(?pattern, removed = removed.len(), "pattern invalidation");
            let invalidation = self.invalidations.begin();
            (
                invalidation,
                self.mirror.remove_matching(pattern).await,
                removed.len(),
            )
        };
        applied.wait().await;
        removed
    }

    // == Get Or Set ==
    /// Read-through lookup: on a miss, `producer` computes the value, which
    /// is cached with `ttl` and returned.
    ///
    /// Concurrent misses on the same key share one producer run. A producer
    /// error is returned unchanged and nothing is cached; a caller that was
    /// waiting on the failed run then tries its own producer. A value whose
    /// computation overlapped a delete, pattern delete or clear is returned
    /// but not cached.
    pub async fn get_or_set<F, Fut, E>(
        &self,
        key: &str,
        producer: F,
        ttl: Option<u64>,
    ) -> std::result::Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Value, E>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let cell = Arc::clone(
            self.in_flight
                .lock()
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new())),
        );
        let _in_flight = InFlightGuard {
            in_flight: &self.in_flight,
            key,
            cell: Arc::clone(&cell),
        };

        let result = cell
            .get_or_try_init(|| async move {
                let epoch = self.invalidations.epoch();
                let value = match producer().await {
                    Ok(value) => value,
                    Err(err) => return Err(err),
                };
                if let Err(err) = self
                    .store_read_through(key, value.clone(), ttl, epoch)
                    .await
                {
                    warn!(key = %key, "read-through value not cached: {}", err);
                }
                Ok::<Value, E>(value)
            })
            .await
            .cloned();
        result
    }

    async fn store_read_through(
        &self,
        key: &str,
        value: Value,
        ttl: Option<u64>,
        epoch: u64,
    ) -> Result<()> {
        validate_key(key)?;

        let entry = self.build_entry(value, ttl, WriteStrategy::ReadThrough);
        let mut inner = self.inner.write().await;
        if !self.invalidations.is_current(epoch) {
            debug!(key = %key, "read-through overlapped an invalidation, not cached");
            return Ok(());
        }
        inner.insert(key.to_string(), entry.clone());
        self.mirror.put(key.to_string(), entry).await;
        Ok(())
    }

    // == Typed Helpers ==
    /// Reads `key` and deserializes it into `T`.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn set_as<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<u64>,
    ) -> Result<()> {
        self.set(key, serde_json::to_value(value)?, ttl).await
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.read().await;
        inner.stats.snapshot(inner.memory.len())
    }

    // == Clear ==
    /// Empties both tiers and zeroes every statistic.
    pub async fn clear(&self) {
        let (_invalidation, applied) = {
            let mut inner = self.inner.write().await;
            inner.memory.clear();
            inner.stats.reset();
            let invalidation = self.invalidations.begin();
            (invalidation, self.mirror.clear().await)
        };
        self.in_flight.lock().clear();
        applied.wait().await;
    }

    // == Sweep ==
    /// Removes expired entries from the memory tier.
    pub async fn cleanup_expired(&self) -> usize {
        let now = self.clock.now_ms();
        self.inner.write().await.memory.remove_expired(now).len()
    }

    /// Full expiry pass over both tiers.
    pub async fn sweep(&self) -> SweepReport {
        let memory = self.cleanup_expired().await;
        let durable = match self.durable.purge_expired(self.clock.now_ms()).await {
            Ok(removed) => removed,
            Err(err) => {
                warn!("durable sweep failed: {}", err);
                0
            }
        };
        SweepReport { memory, durable }
    }

    /// Waits until all queued durable writes are applied.
    pub async fn flush(&self) {
        self.mirror.flush().await;
    }

    // == Length ==
    /// Returns the current number of entries in the memory tier.
    pub async fn len(&self) -> usize {
        self.inner.read().await.memory.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether `key` is physically present in the memory tier, expired or not.
    pub async fn in_memory(&self, key: &str) -> bool {
        self.inner.read().await.memory.get(key).is_some()
    }

    /// Diagnostic read of an entry's metadata without touching stats.
    pub async fn peek_entry(&self, key: &str) -> Option<CacheEntry> {
        self.inner.read().await.memory.get(key).cloned()
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidRequest("Key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidRequest(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}
