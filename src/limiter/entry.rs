//! Rate-Limit Entry Module
//!
//! Per (category, identifier) window state and the evaluation rules that
//! both `check_limit` and `peek_limit` share.

use serde::Serialize;

use crate::limiter::{Category, Policy};

// == Rate Limit Entry ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub category: Category,
    /// Requests observed in the current window
    pub count: u32,
    /// Start of the current fixed window (Unix milliseconds)
    pub window_start: u64,
    pub blocked: bool,
    /// Only meaningful while `blocked` is set
    pub blocked_until: u64,
}

impl RateLimitEntry {
    pub fn new(category: Category, now_ms: u64) -> Self {
        Self {
            category,
            count: 0,
            window_start: now_ms,
            blocked: false,
            blocked_until: 0,
        }
    }

    pub fn is_blocked(&self, now_ms: u64) -> bool {
        self.blocked && now_ms < self.blocked_until
    }

    pub fn window_elapsed(&self, policy: &Policy, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.window_start) >= policy.window_ms
    }

    pub fn window_end(&self, policy: &Policy) -> u64 {
        self.window_start.saturating_add(policy.window_ms)
    }

    /// Stale enough for the sweep: two full windows idle and not under an
    /// active block.
    pub fn is_stale(&self, policy: &Policy, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.window_start) >= policy.window_ms.saturating_mul(2)
            && !self.is_blocked(now_ms)
    }
}

// == Limit Decision ==
/// Result of a limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimitDecision {
    pub allowed: bool,
    /// Requests left in the current window
    pub remaining: u32,
    /// When the current window (or block) ends, Unix milliseconds
    pub reset_at: u64,
    /// Whole seconds to wait; set only when `allowed` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl LimitDecision {
    fn allow(remaining: u32, reset_at: u64) -> Self {
        Self {
            allowed: true,
            remaining,
            reset_at,
            retry_after_secs: None,
        }
    }

    fn deny(until: u64, now_ms: u64) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            reset_at: until,
            retry_after_secs: Some(retry_after_secs(until, now_ms)),
        }
    }
}

/// Seconds until `until`, rounded up and never below one.
pub fn retry_after_secs(until: u64, now_ms: u64) -> u64 {
    until.saturating_sub(now_ms).div_ceil(1000).max(1)
}

/// What a request at `now_ms` would do to `current`.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub decision: LimitDecision,
    /// State to store if the request is consumed
    pub next: RateLimitEntry,
    /// The request pushed the identifier into the blocked state
    pub newly_blocked: bool,
}

// == Evaluate ==
pub fn evaluate(
    current: Option<&RateLimitEntry>,
    category: Category,
    policy: &Policy,
    now_ms: u64,
) -> Evaluation {
    if let Some(entry) = current.filter(|entry| entry.is_blocked(now_ms)) {
        return Evaluation {
            decision: LimitDecision::deny(entry.blocked_until, now_ms),
            next: entry.clone(),
            newly_blocked: false,
        };
    }

    let mut next = match current {
        Some(entry) if !entry.window_elapsed(policy, now_ms) => RateLimitEntry {
            blocked: false,
            ..entry.clone()
        },
        _ => RateLimitEntry::new(category, now_ms),
    };
    next.count = next.count.saturating_add(1);
    let window_end = next.window_end(policy);

    if next.count > policy.max_requests {
        let newly_blocked = match policy.block_duration_ms {
            Some(duration) => {
                next.blocked = true;
                next.blocked_until = now_ms.saturating_add(duration);
                true
            }
            None => false,
        };
        return Evaluation {
            decision: LimitDecision::deny(window_end, now_ms),
            next,
            newly_blocked,
        };
    }

    Evaluation {
        decision: LimitDecision::allow(policy.max_requests - next.count, window_end),
        next,
        newly_blocked: false,
    }
}
