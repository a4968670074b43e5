//! Bounded exponential backoff for transient storage errors (§7), grounded
//! on `toka-agent-runtime::task::TaskExecutor::calculate_retry_delay`'s
//! `base_delay * multiplier.powi(retry_count - 1)` capped at `max_delay`.

use std::future::Future;
use std::time::Duration;

use tracing::warn;
use vigil_store_core::StoreError;

/// Retry policy for transient storage calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Ceiling applied to the computed delay.
    pub max_delay: Duration,
    /// Multiplier applied to the delay on each subsequent retry.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
        }
    }
}

fn is_transient(err: &StoreError) -> bool {
    matches!(err, StoreError::Unavailable(_))
}

fn delay_for(config: &RetryConfig, attempt: u32) -> Duration {
    let secs = config.base_delay.as_secs_f64() * config.backoff_multiplier.powi(attempt as i32 - 1);
    std::cmp::min(Duration::from_secs_f64(secs), config.max_delay)
}

/// Run `op` up to `config.max_retries` extra times when it fails with a
/// transient [`StoreError::Unavailable`], sleeping an exponentially growing
/// delay between attempts. Non-transient errors propagate immediately.
pub async fn retry_with_backoff<F, Fut, T>(config: &RetryConfig, mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_transient(&err) && attempt < config.max_retries => {
                attempt += 1;
                let delay = delay_for(config, attempt);
                warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying transient storage error");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures_within_budget() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig { base_delay: Duration::from_millis(1), max_delay: Duration::from_millis(5), ..RetryConfig::default() };
        let result: Result<u32, StoreError> = retry_with_backoff(&config, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(StoreError::Unavailable("transient".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_transient_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::default();
        let result: Result<u32, StoreError> = retry_with_backoff(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(StoreError::NotFound("x".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausting_retry_budget_surfaces_the_error() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig { max_retries: 2, base_delay: Duration::from_millis(1), max_delay: Duration::from_millis(2), ..RetryConfig::default() };
        let result: Result<u32, StoreError> = retry_with_backoff(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(StoreError::Unavailable("down".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
