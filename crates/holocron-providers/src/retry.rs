//! Shared retry helper.
//!
//! Every provider that talks to the network funnels through this one
//! policy instead of sprinkling ad-hoc sleeps: attempts, base delay,
//! backoff factor and a retry-on predicate.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use holocron_domain::constants::{RETRY_ATTEMPTS, RETRY_BASE_DELAY_MS};
use holocron_domain::{Error, Result};

/// Exponential backoff retry policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts (first try included)
    pub attempts: usize,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Multiplier applied per further attempt
    pub factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::network()
    }
}

impl RetryPolicy {
    /// The standard network policy: 3 attempts, 1 s / 2 s / 4 s backoff.
    #[must_use]
    pub fn network() -> Self {
        Self {
            attempts: RETRY_ATTEMPTS,
            base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
            factor: 2,
        }
    }

    /// Delay before retrying after `attempt` failures (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay * self.factor.saturating_pow(exponent)
    }

    /// Run `operation`, retrying while `retry_on` approves the error.
    ///
    /// # Errors
    ///
    /// Returns the last error once attempts are exhausted or the
    /// predicate rejects one.
    pub async fn run<T, F, Fut, P>(&self, what: &str, mut operation: F, retry_on: P) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&Error) -> bool,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if attempt < self.attempts && retry_on(&error) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        what,
                        attempt,
                        attempts = self.attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Run `operation`, retrying on transient (network-shaped) errors.
    ///
    /// # Errors
    ///
    /// Returns the last error once attempts are exhausted.
    pub async fn run_transient<T, F, Fut>(&self, what: &str, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run(what, operation, Error::is_transient).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(1),
            factor: 2,
        }
    }

    #[test]
    fn delays_follow_exponential_backoff() {
        let policy = RetryPolicy::network();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let result = quick_policy()
            .run_transient("test", move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(Error::network("flaky"))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(result.ok(), Some(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<()> = quick_policy()
            .run_transient("test", move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(Error::network("always down"))
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_transient_errors_fail_immediately() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<()> = quick_policy()
            .run_transient("test", move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(Error::parse("bad payload"))
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
