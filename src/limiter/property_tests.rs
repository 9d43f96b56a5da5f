//! Property-Based Tests for the Rate Limiter

use proptest::prelude::*;
use std::sync::Arc;

use crate::clock::{Clock, ManualClock};
use crate::limiter::{Category, Policy, PolicyTable, RateLimiter};

fn limiter(policy: Policy) -> (RateLimiter, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(0));
    let table = PolicyTable::with_overrides([(Category::Search, policy)]);
    (RateLimiter::with_policies(table, clock.clone()), clock)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    // No window ever admits more than max_requests.
    #[test]
    fn prop_window_ceiling(
        max in 1u32..10,
        window in 100u64..2_000,
        gaps in prop::collection::vec(0u64..400, 1..80)
    ) {
        let (limiter, clock) = limiter(Policy::new(window, max));
        let mut window_start: Option<u64> = None;
        let mut admitted_in_window = 0u32;

        for gap in gaps {
            clock.advance(gap);
            let now = clock.now_ms();
            if window_start.map_or(true, |start| now - start >= window) {
                window_start = Some(now);
                admitted_in_window = 0;
            }
            let expected_allowed = admitted_in_window < max;

            let decision = limiter.check_limit("ip", Category::Search);

            prop_assert_eq!(decision.allowed, expected_allowed);
            if decision.allowed {
                admitted_in_window += 1;
                prop_assert_eq!(decision.remaining, max - admitted_in_window);
            } else {
                prop_assert!(decision.retry_after_secs.unwrap() >= 1);
            }
            prop_assert!(admitted_in_window <= max);
        }
    }

    // Interleaved peeks never change any check outcome.
    #[test]
    fn prop_peeks_are_invisible(
        steps in prop::collection::vec((0u64..600, 0usize..5), 1..40)
    ) {
        let policy = Policy::blocking(1_000, 3, 2_500);
        let (peeked, peeked_clock) = limiter(policy);
        let (plain, plain_clock) = limiter(policy);

        for (gap, peeks) in steps {
            peeked_clock.advance(gap);
            plain_clock.advance(gap);
            for _ in 0..peeks {
                peeked.peek_limit("id", Category::Search);
            }
            prop_assert_eq!(
                peeked.check_limit("id", Category::Search),
                plain.check_limit("id", Category::Search)
            );
        }
    }
}
