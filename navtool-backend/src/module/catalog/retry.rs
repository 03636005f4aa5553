///! Generic retry combinator for network operations
use backon::{ExponentialBuilder, Retryable};
use std::future::Future;
use std::time::Duration;

use crate::error::{ChartError, Result};

/// Exponential backoff settings for transient failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 disables retrying)
    pub max_retries: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: usize, min_delay: Duration) -> Self {
        Self {
            max_retries,
            min_delay,
            max_delay: min_delay.saturating_mul(8),
        }
    }

    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Run `operation`, retrying while `is_retryable` accepts the error.
///
/// The last error is returned once retries are exhausted.
pub async fn with_retry<T, F, Fut, P>(
    policy: &RetryPolicy,
    what: &str,
    is_retryable: P,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: FnMut(&ChartError) -> bool,
{
    if policy.max_retries == 0 {
        return operation().await;
    }

    let backoff = ExponentialBuilder::default()
        .with_min_delay(policy.min_delay)
        .with_max_delay(policy.max_delay)
        .with_max_times(policy.max_retries);

    operation
        .retry(backoff)
        .sleep(tokio::time::sleep)
        .when(is_retryable)
        .notify(|err: &ChartError, delay: Duration| {
            tracing::warn!("{} failed: {}. Retrying in {:?}", what, err, delay);
        })
        .await
}

/// [`with_retry`] using the standard transient-failure classification.
pub async fn retry_transient<T, F, Fut>(policy: &RetryPolicy, what: &str, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    with_retry(policy, what, ChartError::is_retryable, operation).await
}
