//! Exponential backoff with jitter for reconnect loops.

use rand::Rng;
use std::time::Duration;

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
/// capped at `max`, plus up to 10% jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let delay_ms = base_ms
        .saturating_mul(2u64.saturating_pow(attempt - 1))
        .min(max_ms);

    let jitter_range = delay_ms / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(delay_ms + jitter)
}

/// Failure counter for a long-lived retry loop.
#[derive(Debug, Clone)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
    failures: u32,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base_ms,
            max_ms: max_ms.max(base_ms),
            failures: 0,
        }
    }

    /// Record a failure and return how long to wait before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        calculate_backoff(self.failures, self.base_ms, self.max_ms)
    }

    /// Clear the failure streak. Returns how many failures it had.
    pub fn reset(&mut self) -> u32 {
        std::mem::take(&mut self.failures)
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_and_caps() {
        assert_eq!(calculate_backoff(0, 500, 30_000), Duration::ZERO);

        let first = calculate_backoff(1, 500, 30_000).as_millis();
        assert!((500..550).contains(&first));

        let third = calculate_backoff(3, 500, 30_000).as_millis();
        assert!((2_000..2_200).contains(&third));

        let capped = calculate_backoff(20, 500, 30_000).as_millis();
        assert!((30_000..33_000).contains(&capped));
    }

    #[test]
    fn test_backoff_tracks_failure_streak() {
        let mut backoff = Backoff::new(100, 1_000);
        assert!(backoff.next_delay() >= Duration::from_millis(100));
        assert!(backoff.next_delay() >= Duration::from_millis(200));
        assert_eq!(backoff.failures(), 2);

        assert_eq!(backoff.reset(), 2);
        assert_eq!(backoff.failures(), 0);
        assert!(backoff.next_delay() < Duration::from_millis(200));
    }
}
