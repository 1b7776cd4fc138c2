//! Bounded retry and backoff
//!
//! Shared by the session (driver readiness), the element locator and the
//! harvester (login, page loads, detail sections). Every loop is bounded by
//! `max_attempts`; there is no unbounded wait anywhere in the engine.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::Result;

/// Fixed-attempt retry policy with optional exponential backoff
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Pause after the first failed attempt
    pub delay: Duration,
    /// Growth factor applied to the pause after each further failure
    pub multiplier: f64,
    /// Upper bound for a single pause
    pub max_delay: Duration,
    /// Add up to a quarter of the pause as random jitter
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    /// Same pause between every attempt
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            multiplier: 1.0,
            max_delay: delay,
            jitter: false,
        }
    }

    /// Doubling pause, capped at `max_delay`, with jitter
    pub fn exponential(max_attempts: u32, delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            multiplier: 2.0,
            max_delay,
            jitter: true,
        }
    }

    /// Attempt numbers, starting at 1; never empty
    pub fn attempts(&self) -> std::ops::RangeInclusive<u32> {
        1..=self.max_attempts.max(1)
    }

    /// Whether `attempt` is the final one
    pub fn is_last(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts.max(1)
    }

    /// Pause to take after `attempt` failed
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let base = self.delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = base.min(self.max_delay.max(self.delay).as_secs_f64());
        let mut delay = Duration::from_secs_f64(capped.max(0.0));

        if self.jitter && !delay.is_zero() {
            let spread = (delay.as_millis() as u64 / 4).max(1);
            delay += Duration::from_millis(rand::thread_rng().gen_range(0..=spread));
        }

        delay
    }

    /// Sleep after a failed attempt, unless it was the last one
    pub async fn pause(&self, attempt: u32) {
        if self.is_last(attempt) {
            return;
        }
        let delay = self.delay_for(attempt);
        debug!("Retrying in {:?} (attempt {}/{})", delay, attempt, self.max_attempts);
        tokio::time::sleep(delay).await;
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out
    ///
    /// Only errors for which [`crate::Error::is_transient`] holds are retried.
    pub async fn retry<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && !self.is_last(attempt) => {
                    warn!("{} failed (attempt {}/{}): {}", label, attempt, self.max_attempts, e);
                    self.pause(attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_attempts_never_empty() {
        let policy = RetryPolicy::fixed(0, Duration::ZERO);
        assert_eq!(policy.attempts().count(), 1);
        assert!(policy.is_last(1));

        let policy = RetryPolicy::fixed(3, Duration::ZERO);
        assert_eq!(policy.attempts().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_exponential_delay_is_capped() {
        let mut policy = RetryPolicy::exponential(10, Duration::from_millis(100), Duration::from_millis(500));
        policy.jitter = false;

        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(9), Duration::from_millis(500));
    }

    #[test]
    fn test_jitter_stays_within_quarter() {
        let policy = RetryPolicy::exponential(3, Duration::from_millis(400), Duration::from_secs(1));
        for _ in 0..50 {
            let delay = policy.delay_for(1);
            assert!(delay >= Duration::from_millis(400));
            assert!(delay <= Duration::from_millis(500));
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_errors() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(3, Duration::ZERO);

        let result = policy
            .retry("flaky", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(Error::timeout("not yet"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_stops_on_permanent_error() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(5, Duration::ZERO);

        let result: Result<()> = policy
            .retry("login", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::login_failure("bad credentials")) }
            })
            .await;

        assert!(matches!(result, Err(Error::LoginFailure(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(4, Duration::ZERO);

        let result: Result<()> = policy
            .retry("status", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::timeout("driver not ready")) }
            })
            .await;

        assert!(matches!(result, Err(Error::Timeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
