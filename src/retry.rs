//! Bounded-retry execution with exponential backoff.
//!
//! Exhaustion is a value, not an error: callers get a [`RetryOutcome`]
//! whose `value` is None, so a missed entity stays a recoverable event in
//! the batch instead of an abort signal. The executor always runs to
//! success or max_attempts; deciding what a failure class deserves
//! afterwards (skip, degrade, give up) is the pipeline's job.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::classifier::{ErrorClassifier, Severity};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total invocations allowed, including the first. Always ≥ 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Build from the config's `max_retries` (extra attempts beyond the
    /// first, so 0 means try exactly once).
    pub fn from_retries(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self::new(max_retries.saturating_add(1), base_delay, max_delay)
    }

    /// Delay after failed attempt n (1-indexed): base × 2^(n−1), capped.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        let millis = (self.base_delay.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(millis.min(self.max_delay.as_millis() as u64))
    }
}

/// What one retried operation came to.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// None when every attempt failed.
    pub value: Option<T>,
    /// Invocations actually made, 1..=max_attempts.
    pub attempts: u32,
    /// The final failure when exhausted.
    pub last_error: Option<E>,
}

impl<T, E> RetryOutcome<T, E> {
    pub fn succeeded(&self) -> bool {
        self.value.is_some()
    }

    /// Attempts beyond the first, for the retry counter.
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    classifier: ErrorClassifier,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        RetryExecutor {
            policy,
            classifier: ErrorClassifier::new(),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.policy.max_attempts
    }

    /// Execute an async operation with backoff until it succeeds or the
    /// attempt budget is spent. The wait between attempts is scaled by the
    /// classified severity of the failure just seen, so network errors back
    /// off harder than cheap validation misses.
    pub async fn execute<T, E, F, Fut>(&self, mut operation: F) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match operation().await {
                Ok(value) => {
                    debug!("attempt {} succeeded", attempt);
                    return RetryOutcome {
                        value: Some(value),
                        attempts: attempt,
                        last_error: None,
                    };
                }
                Err(e) => {
                    if attempt >= self.policy.max_attempts {
                        warn!("all {} attempt(s) exhausted, giving up: {}", attempt, e);
                        return RetryOutcome {
                            value: None,
                            attempts: attempt,
                            last_error: Some(e),
                        };
                    }

                    let severity = self.classifier.classify(&e.to_string()).severity;
                    let delay = self.scaled_delay(attempt, severity);
                    debug!(
                        "attempt {} failed ({}), retrying in {:?}",
                        attempt, e, delay
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    fn scaled_delay(&self, attempt: u32, severity: Severity) -> Duration {
        let base = self.policy.backoff_delay(attempt);
        let scaled = base.as_millis() as f64 * self.classifier.delay_factor(severity);
        Duration::from_millis(scaled as u64).min(self.policy.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(8))
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(350));

        assert_eq!(policy.backoff_delay(0), Duration::ZERO);
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(350));
        assert_eq!(policy.backoff_delay(4), Duration::from_millis(350));
    }

    #[test]
    fn test_severity_scales_the_backoff() {
        let executor = RetryExecutor::new(RetryPolicy::new(
            5,
            Duration::from_millis(100),
            Duration::from_millis(350),
        ));

        assert_eq!(
            executor.scaled_delay(1, Severity::Moderate),
            Duration::from_millis(100)
        );
        assert_eq!(
            executor.scaled_delay(1, Severity::Critical),
            Duration::from_millis(200)
        );
        assert_eq!(
            executor.scaled_delay(1, Severity::Low),
            Duration::from_millis(50)
        );
        // 200ms base doubled would be 400ms; the cap holds after scaling.
        assert_eq!(
            executor.scaled_delay(2, Severity::Critical),
            Duration::from_millis(350)
        );
    }

    #[test]
    fn test_from_retries_counts_first_attempt() {
        let policy = RetryPolicy::from_retries(0, Duration::ZERO, Duration::ZERO);
        assert_eq!(policy.max_attempts, 1);

        let policy = RetryPolicy::from_retries(3, Duration::ZERO, Duration::ZERO);
        assert_eq!(policy.max_attempts, 4);
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let executor = RetryExecutor::new(fast_policy(3));
        let outcome: RetryOutcome<i32, String> = executor.execute(|| async { Ok(7) }).await;

        assert!(outcome.succeeded());
        assert_eq!(outcome.value, Some(7));
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.retries(), 0);
        assert!(outcome.last_error.is_none());
    }

    #[tokio::test]
    async fn test_k_failures_then_success_takes_k_plus_one_invocations() {
        let calls = Cell::new(0u32);
        let executor = RetryExecutor::new(fast_policy(5));

        let outcome: RetryOutcome<&str, String> = executor
            .execute(|| {
                let n = calls.get() + 1;
                calls.set(n);
                async move {
                    if n <= 2 {
                        Err("network error: connection reset".to_string())
                    } else {
                        Ok("payload")
                    }
                }
            })
            .await;

        assert_eq!(outcome.value, Some("payload"));
        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_is_a_value_after_exactly_max_attempts() {
        let calls = Cell::new(0u32);
        let executor = RetryExecutor::new(fast_policy(4));

        let outcome: RetryOutcome<(), String> = executor
            .execute(|| {
                calls.set(calls.get() + 1);
                async { Err("network error: unreachable".to_string()) }
            })
            .await;

        assert!(!outcome.succeeded());
        assert_eq!(outcome.attempts, 4);
        assert_eq!(calls.get(), 4);
        assert_eq!(outcome.retries(), 3);
        assert!(outcome.last_error.is_some());
    }

    #[tokio::test]
    async fn test_single_attempt_budget_never_retries() {
        let calls = Cell::new(0u32);
        let executor = RetryExecutor::new(fast_policy(1));

        let outcome: RetryOutcome<(), String> = executor
            .execute(|| {
                calls.set(calls.get() + 1);
                async { Err("whatever".to_string()) }
            })
            .await;

        assert_eq!(calls.get(), 1);
        assert_eq!(outcome.attempts, 1);
    }
}
