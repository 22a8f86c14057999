//! Reconnect backoff schedule.
//!
//! Delay for attempt `n` (1-based) is `base * 2^(n-1)`; after
//! `max_attempts` the schedule is exhausted and the caller must give up.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max_attempts: u32,
    attempt: u32,
}

impl Backoff {
    pub const fn new(base: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max_attempts,
            attempt: 0,
        }
    }

    /// Next `(attempt, delay)` pair, or `None` once exhausted.
    pub fn next_delay(&mut self) -> Option<(u32, Duration)> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        self.attempt += 1;
        let factor = 2u32.saturating_pow(self.attempt - 1);
        Some((self.attempt, self.base.saturating_mul(factor)))
    }

    /// Called after a successful connect.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub const fn attempts(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubles_then_exhausts() {
        let mut b = Backoff::new(Duration::from_secs(1), 5);
        let delays: Vec<u64> = std::iter::from_fn(|| b.next_delay())
            .map(|(_, d)| d.as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16]);
        assert!(b.next_delay().is_none());
        assert_eq!(b.attempts(), 5);
    }

    #[test]
    fn test_reset_restarts_schedule() {
        let mut b = Backoff::new(Duration::from_millis(100), 2);
        b.next_delay();
        b.next_delay();
        b.reset();
        assert_eq!(b.next_delay(), Some((1, Duration::from_millis(100))));
    }
}
