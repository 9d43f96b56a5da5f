//! Limit Guard
//!
//! Wraps an arbitrary operation with a limit check, failing with a typed
//! [`RateLimited`] error instead of running it when the caller is over budget.

use std::future::Future;

use serde::Serialize;
use thiserror::Error;

use crate::limiter::{Category, LimitDecision, RateLimiter};

// == Rate Limited ==
/// The caller must back off for `retry_after_secs` before trying again.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("Rate limited ({category}): retry after {retry_after_secs}s")]
pub struct RateLimited {
    pub category: Category,
    pub retry_after_secs: u64,
}

impl RateLimiter {
    // == Enforce ==
    /// Consumes one request, converting a denial into [`RateLimited`].
    pub fn enforce(
        &self,
        identifier: &str,
        category: Category,
    ) -> Result<LimitDecision, RateLimited> {
        let decision = self.check_limit(identifier, category);
        if decision.allowed {
            Ok(decision)
        } else {
            Err(RateLimited {
                category,
                retry_after_secs: decision.retry_after_secs.unwrap_or(1),
            })
        }
    }

    // == Limited ==
    /// Runs `op` only if `identifier` is within budget for `category`.
    ///
    /// A denial is returned as `E::from(RateLimited)` and `op` never runs;
    /// `op`'s own errors pass through unchanged.
    pub async fn limited<T, E, F, Fut>(
        &self,
        identifier: &str,
        category: Category,
        op: F,
    ) -> Result<T, E>
    where
        E: From<RateLimited>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.enforce(identifier, category)?;
        op().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::CacheError;
    use crate::limiter::{Policy, PolicyTable};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn limiter() -> RateLimiter {
        let table = PolicyTable::with_overrides([(Category::Financial, Policy::new(60_000, 2))]);
        RateLimiter::with_policies(table, Arc::new(ManualClock::new(0)))
    }

    #[tokio::test]
    async fn test_limited_runs_op_within_budget() {
        let limiter = limiter();

        let result: Result<u32, CacheError> = limiter
            .limited("wallet-7", Category::Financial, || async { Ok(42) })
            .await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_limited_rejects_without_running_op() {
        let limiter = limiter();
        let runs = AtomicUsize::new(0);
        let runs = &runs;

        let mut outcomes = Vec::new();
        for _ in 0..3 {
            let result: Result<(), CacheError> = limiter
                .limited("wallet-7", Category::Financial, move || async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .await;
            outcomes.push(result);
        }

        assert_eq!(runs.load(Ordering::SeqCst), 2);
        match &outcomes[2] {
            Err(CacheError::RateLimited(limited)) => {
                assert_eq!(limited.category, Category::Financial);
                assert_eq!(limited.retry_after_secs, 60);
            }
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_limited_passes_op_errors_through() {
        let limiter = limiter();

        let result: Result<(), CacheError> = limiter
            .limited("u", Category::Financial, || async {
                Err(CacheError::Internal("escrow unavailable".to_string()))
            })
            .await;

        assert!(matches!(result, Err(CacheError::Internal(_))));
    }

    #[test]
    fn test_enforce() {
        let limiter = limiter();
        assert!(limiter.enforce("u", Category::Financial).is_ok());
        assert!(limiter.enforce("u", Category::Financial).is_ok());
        assert_eq!(
            limiter.enforce("u", Category::Financial),
            Err(RateLimited {
                category: Category::Financial,
                retry_after_secs: 60
            })
        );
    }
}
