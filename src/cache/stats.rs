//! Cache Statistics Module
//!
//! Tracks hits, misses, evictions and a rolling sample of get latencies.

use std::collections::VecDeque;

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time view of cache performance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (absent or expired)
    pub misses: u64,
    /// Entries evicted from the memory tier on overflow
    pub evictions: u64,
    /// Current number of entries in the memory tier
    pub size: usize,
    /// hits / (hits + misses), 0.0 before any request
    pub hit_rate: f64,
    /// Mean of the rolling latency sample, in milliseconds
    pub avg_response_time_ms: f64,
}

// == Stats Collector ==
/// Mutable counters behind a [`CacheStats`] snapshot.
#[derive(Debug)]
pub struct StatsCollector {
    hits: u64,
    misses: u64,
    evictions: u64,
    latencies_ms: VecDeque<f64>,
    latency_sum_ms: f64,
    max_samples: usize,
}

impl StatsCollector {
    // == Constructor ==
    /// Creates a collector keeping at most `max_samples` latency samples.
    pub fn new(max_samples: usize) -> Self {
        Self {
            hits: 0,
            misses: 0,
            evictions: 0,
            latencies_ms: VecDeque::with_capacity(max_samples.min(1024)),
            latency_sum_ms: 0.0,
            max_samples: max_samples.max(1),
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    // == Record Latency ==
    /// Adds a latency sample, discarding the oldest beyond the sample size.
    pub fn record_latency(&mut self, ms: f64) {
        if self.latencies_ms.len() == self.max_samples {
            if let Some(oldest) = self.latencies_ms.pop_front() {
                self.latency_sum_ms -= oldest;
            }
        }
        self.latencies_ms.push_back(ms);
        self.latency_sum_ms += ms;
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn avg_response_time_ms(&self) -> f64 {
        if self.latencies_ms.is_empty() {
            0.0
        } else {
            (self.latency_sum_ms / self.latencies_ms.len() as f64).max(0.0)
        }
    }

    pub fn sample_count(&self) -> usize {
        self.latencies_ms.len()
    }

    /// Zeroes every counter and drops all samples.
    pub fn reset(&mut self) {
        *self = Self::new(self.max_samples);
    }

    pub fn snapshot(&self, size: usize) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            size,
            hit_rate: self.hit_rate(),
            avg_response_time_ms: self.avg_response_time_ms(),
        }
    }
}
