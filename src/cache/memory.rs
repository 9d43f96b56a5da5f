//! Memory Tier Module
//!
//! Bounded in-process map. Eviction removes the entry with the oldest
//! `created_at` (FIFO by creation); reads do not refresh an entry's position.

use std::collections::{BTreeMap, HashMap};

use crate::cache::CacheEntry;
use crate::keys::KeyPattern;

#[derive(Debug)]
struct Slot {
    entry: CacheEntry,
    seq: u64,
}

// == Memory Tier ==
/// Fast, volatile tier with a hard capacity.
///
/// `order` indexes keys by `(created_at, insertion sequence)` so the eviction
/// victim is always the first element; ties on `created_at` fall back to
/// insertion order.
#[derive(Debug)]
pub struct MemoryTier {
    entries: HashMap<String, Slot>,
    order: BTreeMap<(u64, u64), String>,
    capacity: usize,
    next_seq: u64,
}

impl MemoryTier {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            capacity: capacity.max(1),
            next_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key).map(|slot| &slot.entry)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut CacheEntry> {
        self.entries.get_mut(key).map(|slot| &mut slot.entry)
    }

    // == Insert ==
    /// Inserts or replaces `key`. When a new key arrives at capacity, the
    /// oldest-created entry is evicted first and its key returned.
    pub fn insert(&mut self, key: String, entry: CacheEntry) -> Option<String> {
        let mut evicted = None;
        if self.remove(&key).is_none() && self.entries.len() >= self.capacity {
            evicted = self.evict_oldest();
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert((entry.created_at, seq), key.clone());
        self.entries.insert(key, Slot { entry, seq });
        evicted
    }

    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let slot = self.entries.remove(key)?;
        self.order.remove(&(slot.entry.created_at, slot.seq));
        Some(slot.entry)
    }

    /// Key that the next overflow would evict.
    pub fn peek_oldest(&self) -> Option<&str> {
        self.order.values().next().map(String::as_str)
    }

    fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.entries.remove(&key);
        Some(key)
    }

    /// Removes every key matching `pattern`, returning the removed keys.
    pub fn remove_matching(&mut self, pattern: &KeyPattern) -> Vec<String> {
        let keys: Vec<String> = self
            .entries
            .keys()
            .filter(|key| pattern.matches(key))
            .cloned()
            .collect();
        for key in &keys {
            self.remove(key);
        }
        keys
    }

    /// Removes every entry expired at `now_ms`, returning the removed keys.
    pub fn remove_expired(&mut self, now_ms: u64) -> Vec<String> {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, slot)| slot.entry.is_expired(now_ms))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            self.remove(key);
        }
        keys
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
