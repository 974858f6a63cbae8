//! Bounded retries with pluggable backoff for collaborator calls.
//!
//! Every call to a remote model goes through [`RetryPolicy::run`]: each
//! attempt is wrapped in a timeout, a timeout counts as a retryable failure,
//! and the loop stops after `max_attempts` or at the first non-retryable
//! error.

use crate::config::RetrySettings;
use crate::error::{KapittelError, Result};
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Computes the pause before the next attempt.
pub trait BackoffPolicy: Send + Sync {
    /// Delay to wait after the given failed attempt (1-based).
    fn delay(&self, attempt: u32) -> Duration;
}

/// Exponential backoff with symmetric jitter.
///
/// `delay = min(max, base * 2^(attempt-1)) * (1 ± jitter)`
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub max: Duration,
    /// Jitter factor in `[0.0, 1.0]`.
    pub jitter: f64,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max: Duration, jitter: f64) -> Self {
        Self {
            base,
            max,
            jitter: jitter.clamp(0.0, 1.0),
        }
    }

    /// Capped exponential delay before jitter is applied.
    fn capped(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let base_ms = self.base.as_millis() as u64;
        let ms = base_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(ms).min(self.max)
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let capped = self.capped(attempt).as_secs_f64();
        if self.jitter == 0.0 {
            return Duration::from_secs_f64(capped);
        }
        let random: f64 = rand::thread_rng().gen();
        let factor = 1.0 + (random * 2.0 - 1.0) * self.jitter;
        Duration::from_secs_f64((capped * factor).max(0.0))
    }
}

/// Retries immediately. Used by tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackoff;

impl BackoffPolicy for NoBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        Duration::ZERO
    }
}

/// Final failure of a retried call.
#[derive(Debug)]
pub struct Exhausted {
    /// Attempts actually made.
    pub attempts: u32,
    /// The error of the last attempt.
    pub error: KapittelError,
}

/// Attempt cap, per-attempt timeout and backoff policy.
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub timeout: Duration,
    pub backoff: Arc<dyn BackoffPolicy>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, timeout: Duration, backoff: Arc<dyn BackoffPolicy>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            timeout,
            backoff,
        }
    }

    /// Build the production policy from settings.
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self::new(
            settings.max_attempts,
            Duration::from_secs(settings.timeout_seconds),
            Arc::new(ExponentialBackoff::new(
                Duration::from_millis(settings.base_delay_ms),
                Duration::from_millis(settings.max_delay_ms),
                settings.jitter,
            )),
        )
    }

    /// A policy that never sleeps between attempts.
    pub fn immediate(max_attempts: u32, timeout: Duration) -> Self {
        Self::new(max_attempts, timeout, Arc::new(NoBackoff))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt cap is reached.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> std::result::Result<T, Exhausted>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = match tokio::time::timeout(self.timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(KapittelError::Timeout {
                    operation: operation.to_string(),
                    seconds: self.timeout.as_secs_f64(),
                }),
            };

            match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", operation, attempt);
                    }
                    return Ok(value);
                }
                Err(error) if error.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.backoff.delay(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        operation, attempt, self.max_attempts, error, delay
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(error) => {
                    return Err(Exhausted {
                        attempts: attempt,
                        error,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_exponential_backoff_is_capped() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_millis(500), 0.0);
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(400));
        assert_eq!(backoff.delay(4), Duration::from_millis(500));
        assert_eq!(backoff.delay(40), Duration::from_millis(500));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(1000), Duration::from_secs(60), 0.2);
        for _ in 0..50 {
            let ms = backoff.delay(1).as_millis();
            assert!((800..=1200).contains(&ms), "delay {} out of range", ms);
        }
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let policy = RetryPolicy::immediate(3, Duration::from_secs(1));
        let calls = AtomicU32::new(0);

        let result = policy
            .run("flaky", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(KapittelError::OpenAI("503".into()))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_cap() {
        let policy = RetryPolicy::immediate(2, Duration::from_secs(1));
        let result: std::result::Result<(), _> = policy
            .run("down", || async { Err(KapittelError::OpenAI("down".into())) })
            .await;

        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 2);
        assert!(matches!(exhausted.error, KapittelError::OpenAI(_)));
    }

    #[tokio::test]
    async fn test_non_retryable_stops_immediately() {
        let policy = RetryPolicy::immediate(5, Duration::from_secs(1));
        let calls = AtomicU32::new(0);
        let result: std::result::Result<(), _> = policy
            .run("bad", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(KapittelError::InvalidInput("nope".into()))
            })
            .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_retried() {
        let policy = RetryPolicy::immediate(2, Duration::from_millis(20));
        let calls = AtomicU32::new(0);

        let result = policy
            .run("slow", || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                Ok("done")
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
