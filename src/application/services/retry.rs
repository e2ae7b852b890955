use std::future::Future;
use std::time::Duration;

use crate::domain::Result;

/// Upper bound on retries for any external call.
pub const MAX_RETRIES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries: max_retries.min(MAX_RETRIES),
            ..Self::default()
        }
    }

    pub fn none() -> Self {
        Self::new(0)
    }

    pub fn with_backoff(mut self, initial: Duration, multiplier: f64, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.multiplier = multiplier;
        self.max_backoff = max;
        self
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_backoff: Duration::from_millis(200),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(2),
        }
    }
}

/// Runs `call`, retrying transient failures with exponential backoff.
///
/// Only errors for which [`crate::domain::DomainError::is_retryable`] holds are retried; the
/// last error is returned once the policy's retries are spent.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, operation: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let backoff = policy.backoff(attempt);
                tracing::warn!(
                    operation,
                    attempt = attempt + 1,
                    max = policy.max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "retrying after transient error"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let policy = RetryPolicy::default().with_backoff(
            Duration::from_millis(100),
            2.0,
            Duration::from_millis(300),
        );

        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(300));
    }

    #[test]
    fn test_retries_are_bounded() {
        assert_eq!(RetryPolicy::new(10).max_retries, MAX_RETRIES);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&RetryPolicy::default(), "embed", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(DomainError::embedding("connection reset"))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&RetryPolicy::default(), "generate", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(DomainError::generation("503"))
        })
        .await;

        assert!(matches!(result, Err(DomainError::GenerationUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1 + MAX_RETRIES);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&RetryPolicy::default(), "generate", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(DomainError::GenerationTimeout(30))
        })
        .await;

        assert_eq!(result, Err(DomainError::GenerationTimeout(30)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
