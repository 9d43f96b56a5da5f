//! Rate Limiter Module
//!
//! Fixed-window request counting per (category, identifier) with an
//! escalating block state. State is split across independently locked
//! shards so a check is atomic for its key without serializing all callers.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::clock::{SharedClock, SystemClock};
use crate::keys;
use crate::limiter::entry::{evaluate, RateLimitEntry};
use crate::limiter::{Category, LimitDecision, PolicyTable};

const SHARD_COUNT: usize = 16;

type Shard = Mutex<HashMap<String, RateLimitEntry>>;

// == Limiter Stats ==
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LimiterStats {
    pub total_entries: usize,
    /// Entries currently inside an active block
    pub blocked_entries: usize,
    pub by_category: BTreeMap<Category, usize>,
    /// Calls to `check_limit`
    pub checks: u64,
    /// Checks that returned not-allowed
    pub rejected: u64,
    /// Transitions into the blocked state, administrative ones included
    pub blocks_applied: u64,
}

// == Rate Limiter ==
#[derive(Debug)]
pub struct RateLimiter {
    shards: Vec<Shard>,
    policies: PolicyTable,
    clock: SharedClock,
    checks: AtomicU64,
    rejected: AtomicU64,
    blocks_applied: AtomicU64,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    // == Constructor ==
    /// Limiter using the default category table and the system clock.
    pub fn new() -> Self {
        Self::with_policies(PolicyTable::default(), Arc::new(SystemClock))
    }

    pub fn with_policies(policies: PolicyTable, clock: SharedClock) -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
            policies,
            clock,
            checks: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            blocks_applied: AtomicU64::new(0),
        }
    }

    fn shard(&self, key: &str) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % self.shards.len()]
    }

    // == Check Limit ==
    /// Counts one request for `identifier` and reports whether it may proceed.
    pub fn check_limit(&self, identifier: &str, category: Category) -> LimitDecision {
        let key = keys::rate_limit_key(category.as_str(), identifier);
        let policy = self.policies.get(category);
        let now = self.clock.now_ms();

        let evaluation = {
            let mut shard = self.shard(&key).lock();
            let evaluation = evaluate(shard.get(&key), category, &policy, now);
            shard.insert(key, evaluation.next.clone());
            evaluation
        };

        self.checks.fetch_add(1, Ordering::Relaxed);
        if !evaluation.decision.allowed {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        }
        if evaluation.newly_blocked {
            self.blocks_applied.fetch_add(1, Ordering::Relaxed);
            warn!(
                identifier,
                %category,
                until = evaluation.next.blocked_until,
                "identifier blocked after exceeding its limit"
            );
        }
        evaluation.decision
    }

    // == Peek Limit ==
    /// Same answer `check_limit` would give now, without consuming budget
    /// or creating state.
    pub fn peek_limit(&self, identifier: &str, category: Category) -> LimitDecision {
        let key = keys::rate_limit_key(category.as_str(), identifier);
        let policy = self.policies.get(category);
        let now = self.clock.now_ms();

        let shard = self.shard(&key).lock();
        evaluate(shard.get(&key), category, &policy, now).decision
    }

    // == Reset ==
    /// Restores full budget for `identifier` in one category, or in all of
    /// them when `category` is `None`. Unknown identifiers are a no-op.
    pub fn reset(&self, identifier: &str, category: Option<Category>) {
        let categories = match category {
            Some(category) => vec![category],
            None => Category::ALL.to_vec(),
        };
        for category in categories {
            let key = keys::rate_limit_key(category.as_str(), identifier);
            if self.shard(&key).lock().remove(&key).is_some() {
                debug!(identifier, %category, "rate limit reset");
            }
        }
    }

    // == Block ==
    /// Forces `identifier` into the blocked state for `duration_ms`,
    /// whatever its current count.
    pub fn block(&self, identifier: &str, category: Category, duration_ms: u64) {
        let key = keys::rate_limit_key(category.as_str(), identifier);
        let now = self.clock.now_ms();

        {
            let mut shard = self.shard(&key).lock();
            let entry = shard
                .entry(key)
                .or_insert_with(|| RateLimitEntry::new(category, now));
            entry.blocked = true;
            entry.blocked_until = now.saturating_add(duration_ms);
        }

        self.blocks_applied.fetch_add(1, Ordering::Relaxed);
        warn!(identifier, %category, duration_ms, "identifier blocked by operator");
    }

    // == Sweep ==
    /// Drops entries idle for two windows that are not under an active
    /// block. Locks one shard at a time.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut removed = 0;
        for shard in &self.shards {
            let mut shard = shard.lock();
            let before = shard.len();
            shard.retain(|_, entry| !entry.is_stale(&self.policies.get(entry.category), now));
            removed += before - shard.len();
        }
        removed
    }

    // == Stats ==
    pub fn stats(&self) -> LimiterStats {
        let now = self.clock.now_ms();
        let mut stats = LimiterStats {
            checks: self.checks.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            blocks_applied: self.blocks_applied.load(Ordering::Relaxed),
            ..LimiterStats::default()
        };

        for shard in &self.shards {
            for entry in shard.lock().values() {
                stats.total_entries += 1;
                if entry.is_blocked(now) {
                    stats.blocked_entries += 1;
                }
                *stats.by_category.entry(entry.category).or_insert(0) += 1;
            }
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
