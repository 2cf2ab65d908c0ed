//! Exponential backoff with jitter for readiness polling.

use std::time::Duration;
use rand::Rng;

/// Delay before poll number `attempt` (1-based), doubling from `base_ms` up to `max_ms`.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let delay_ms = base_ms
        .saturating_mul(2u64.saturating_pow(attempt - 1))
        .min(max_ms);

    // Up to 10% jitter so a restarted agent is not polled in lockstep
    let jitter_range = delay_ms / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(delay_ms + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_has_no_delay() {
        assert_eq!(calculate_backoff(0, 100, 2000), Duration::ZERO);
    }

    #[test]
    fn delay_doubles_then_caps() {
        let first = calculate_backoff(1, 100, 2000);
        assert!(first >= Duration::from_millis(100) && first < Duration::from_millis(110));

        let third = calculate_backoff(3, 100, 2000);
        assert!(third >= Duration::from_millis(400) && third < Duration::from_millis(440));

        let capped = calculate_backoff(30, 100, 1000);
        assert!(capped >= Duration::from_millis(1000) && capped < Duration::from_millis(1100));
    }
}
