//! Monotonic rate limiting for the expensive refresh steps.

use std::time::Duration;

/// Fires at most once per `interval` of context time.
///
/// A fresh (or reset) limiter fires on its first test.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
    last: Option<Duration>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Returns true and restarts the interval if it has elapsed.
    pub fn test_and_set(&mut self, now: Duration) -> bool {
        match self.last {
            Some(last) if now.saturating_sub(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    /// Re-arms the limiter so the next test fires immediately.
    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_on_first_test() {
        let mut limiter = RateLimiter::new(Duration::from_millis(1000));
        assert!(limiter.test_and_set(Duration::ZERO));
        assert!(!limiter.test_and_set(Duration::from_millis(999)));
        assert!(limiter.test_and_set(Duration::from_millis(1000)));
        assert!(!limiter.test_and_set(Duration::from_millis(1500)));
    }

    #[test]
    fn test_reset_rearms() {
        let mut limiter = RateLimiter::new(Duration::from_millis(3000));
        assert!(limiter.test_and_set(Duration::from_millis(10)));
        limiter.reset();
        assert!(limiter.test_and_set(Duration::from_millis(20)));
    }

    #[test]
    fn test_clock_going_backwards_does_not_fire() {
        let mut limiter = RateLimiter::new(Duration::from_millis(1000));
        assert!(limiter.test_and_set(Duration::from_secs(5)));
        assert!(!limiter.test_and_set(Duration::from_secs(4)));
    }
}
