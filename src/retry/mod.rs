//! Retry policy for store queries
//!
//! A policy is a maximum attempt count plus a backoff schedule. It wraps any
//! fallible async operation and returns either the value or a [`RetryError`]
//! recording how many attempts were made.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::types::MapError;

/// Delay schedule between attempts
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// `step * attempt`
    Linear { step: Duration },
    /// `initial * multiplier^(attempt - 1)`, never above `max`
    Exponential {
        initial: Duration,
        multiplier: f64,
        max: Duration,
    },
}

impl Backoff {
    /// Delay to wait after the given (1-based) failed attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        match *self {
            Self::Linear { step } => step.saturating_mul(attempt),
            Self::Exponential {
                initial,
                multiplier,
                max,
            } => {
                let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
                let delay_ms = initial.as_millis() as f64 * multiplier.powi(exponent);
                let capped_ms = delay_ms.min(max.as_millis() as f64);
                Duration::from_millis(capped_ms as u64)
            }
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    pub backoff: Backoff,
}

/// Returned when every attempt failed or the error was not retryable
#[derive(Debug)]
pub struct RetryError<E> {
    /// Attempts actually made
    pub attempts: u32,
    pub last_error: E,
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (after {} attempts)", self.last_error, self.attempts)
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryError<E> {}

/// Errors that can tell a retry loop whether trying again is worthwhile
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for MapError {
    fn is_retryable(&self) -> bool {
        MapError::is_retryable(self)
    }
}

impl RetryPolicy {
    /// Up to 3 attempts, waiting 1s then 2s
    pub fn count_default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Linear {
                step: Duration::from_secs(1),
            },
        }
    }

    /// Up to 3 attempts, doubling from 1s and capped at 5s
    pub fn batch_default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Exponential {
                initial: Duration::from_secs(1),
                multiplier: 2.0,
                max: Duration::from_secs(5),
            },
        }
    }

    /// A single attempt, no waiting
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::Linear {
                step: Duration::ZERO,
            },
        }
    }

    /// Execute an operation, retrying retryable failures
    pub async fn execute<F, Fut, T, E>(
        &self,
        operation_name: &str,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!(operation = operation_name, attempt, "Succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(e) if !e.is_retryable() => {
                    return Err(RetryError {
                        attempts: attempt,
                        last_error: e,
                    });
                }
                Err(e) => {
                    if attempt >= max_attempts {
                        warn!(
                            operation = operation_name,
                            attempt,
                            max_attempts,
                            error = %e,
                            "Retry exhausted"
                        );
                        return Err(RetryError {
                            attempts: attempt,
                            last_error: e,
                        });
                    }

                    let delay = self.backoff.delay_for_attempt(attempt);
                    warn!(
                        operation = operation_name,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn test_linear_backoff() {
        let backoff = RetryPolicy::count_default().backoff;
        assert_eq!(backoff.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(backoff.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(backoff.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_secs(3));
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let backoff = RetryPolicy::batch_default().backoff;
        assert_eq!(backoff.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(backoff.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(backoff.delay_for_attempt(4), Duration::from_secs(5));
        assert_eq!(backoff.delay_for_attempt(30), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let started = Instant::now();

        let result = RetryPolicy::count_default()
            .execute("test", move || async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(MapError::Database("timeout".into()))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s after the first failure, 2s after the second
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_reports_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let err = RetryPolicy::batch_default()
            .execute("test", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(MapError::Database("network unreachable".into()))
            })
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(err.to_string().contains("network unreachable"));
        assert!(err.to_string().contains("3 attempts"));
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let err = RetryPolicy::batch_default()
            .execute("test", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(MapError::DatabaseUnavailable)
            })
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_none_policy_makes_one_attempt() {
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let _ = RetryPolicy::none()
            .execute("test", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(MapError::Database("boom".into()))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
