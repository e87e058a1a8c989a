//! Bounded retry for transient network failures
//!
//! Off by default (`max_retries = 0`). Only [`DreamError::Network`] is
//! retried; every other error returns on the first attempt.

use std::future::Future;
use std::time::Duration;
use tracing::warn;
use wombo_core::config::RetryConfig;
use wombo_core::Result;

/// Retry settings for one class of calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    pub fn new(max_retries: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
            max_backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

/// Run `f`, retrying transient failures with doubling backoff
pub async fn with_retries<F, Fut, T>(policy: RetryPolicy, operation_name: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    let mut backoff = policy.initial_backoff;

    loop {
        match f().await {
            Ok(val) => return Ok(val),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    operation_name,
                    attempt,
                    policy.max_retries + 1,
                    backoff,
                    e
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(policy.max_backoff);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wombo_core::DreamError;

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let mut attempts = 0;
        let result: Result<i32> = with_retries(RetryPolicy::default(), "test_op", || {
            attempts += 1;
            async { Err(DreamError::Network("reset".to_string())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_until_success() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100), Duration::from_secs(1));
        let mut attempts = 0;
        let result = with_retries(policy, "test_op", || {
            attempts += 1;
            let current = attempts;
            async move {
                if current < 3 {
                    Err(DreamError::Network("transient".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let policy = RetryPolicy::new(2, Duration::from_millis(10), Duration::from_millis(20));
        let mut attempts = 0;
        let result: Result<()> = with_retries(policy, "test_op", || {
            attempts += 1;
            async { Err(DreamError::Network("down".to_string())) }
        })
        .await;
        assert!(matches!(result, Err(DreamError::Network(_))));
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_non_transient_not_retried() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1), Duration::from_millis(1));
        let mut attempts = 0;
        let result: Result<()> = with_retries(policy, "test_op", || {
            attempts += 1;
            async { Err(DreamError::Auth("no idToken".to_string())) }
        })
        .await;
        assert!(matches!(result, Err(DreamError::Auth(_))));
        assert_eq!(attempts, 1);
    }
}
