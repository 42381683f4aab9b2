//! Bounded retry with a fixed interval for flaky provider calls.

use std::fmt::Display;
use std::thread;
use std::time::Duration;

/// Retry settings for provider calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of calls, including the first
    pub max_attempts: u32,
    /// Pause between calls
    pub interval: Duration,
    /// Multiplier applied to the interval after each failure (1.0 = fixed)
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_secs(3),
            backoff_factor: 1.0,
        }
    }
}

impl RetryPolicy {
    /// Fixed-interval policy.
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            backoff_factor: 1.0,
        }
    }

    /// Set a backoff multiplier.
    pub fn with_backoff(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// A policy that calls exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay after the given failed attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if self.backoff_factor <= 1.0 {
            return self.interval;
        }
        let factor = self.backoff_factor.powi(attempt as i32);
        Duration::from_secs_f64(self.interval.as_secs_f64() * factor)
    }
}

/// Call `operation` up to `max_attempts` times, sleeping `interval` between
/// failures. Returns the last error if every attempt fails.
pub fn retry<T, E, F>(max_attempts: u32, interval: Duration, operation: F) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Result<T, E>,
{
    with_retry(&RetryPolicy::fixed(max_attempts, interval), operation)
}

/// Execute an operation under a retry policy.
///
/// Every error is retried; callers only wrap operations that are safe to
/// repeat. A zero attempt budget still calls once.
pub fn with_retry<T, E, F>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Result<T, E>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(e);
                }

                let delay = policy.delay_for_attempt(attempt - 1);
                log::warn!(
                    "attempt {}/{} failed: {}; retrying in {:?}",
                    attempt,
                    max_attempts,
                    e,
                    delay
                );
                thread::sleep(delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_retry_success_first_try() {
        let calls = Cell::new(0);
        let result: Result<u32, String> = retry(3, Duration::ZERO, || {
            calls.set(calls.get() + 1);
            Ok(42)
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_retry_eventual_success() {
        let calls = Cell::new(0);
        let result: Result<u32, String> = retry(5, Duration::from_millis(1), || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err("throttled".to_string())
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_retry_returns_last_error() {
        let calls = Cell::new(0);
        let result: Result<(), String> = retry(3, Duration::from_millis(1), || {
            calls.set(calls.get() + 1);
            Err(format!("failure {}", calls.get()))
        });
        assert_eq!(result.unwrap_err(), "failure 3");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_zero_attempts_still_calls_once() {
        let calls = Cell::new(0);
        let _: Result<(), String> = retry(0, Duration::ZERO, || {
            calls.set(calls.get() + 1);
            Err("nope".to_string())
        });
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_fixed_interval_by_default() {
        let policy = RetryPolicy::fixed(5, Duration::from_secs(3));
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(3));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(3));
    }

    #[test]
    fn test_backoff_multiplier() {
        let policy = RetryPolicy::fixed(5, Duration::from_secs(1)).with_backoff(2.0);
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(8));
    }
}
