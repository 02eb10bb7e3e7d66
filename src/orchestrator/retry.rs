//! Exponential backoff with jitter around a fallible provider call (§4.8).

use rand::Rng;
use tracing::warn;

use crate::config::RetryConfig;
use crate::error::ProviderError;

/// Retries `op` according to `config`, stopping as soon as it returns a
/// non-retryable error or `max_attempts` is exhausted. Timeouts count as
/// retryable (§4.2 "the three error kinds").
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: &str, mut op: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ProviderError>>,
{
    let mut backoff = config.initial_backoff;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match tokio::time::timeout(config.timeout, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) if !err.is_retryable() || attempt >= config.max_attempts => return Err(err),
            Ok(Err(err)) => {
                warn!(%operation, attempt, %err, "retrying after transient provider error");
            }
            Err(_elapsed) if attempt >= config.max_attempts => {
                return Err(ProviderError::Timeout(config.timeout));
            }
            Err(_elapsed) => {
                warn!(%operation, attempt, "retrying after provider timeout");
            }
        }

        let jitter = 1.0 + rand::thread_rng().gen_range(-config.jitter_factor..=config.jitter_factor);
        let sleep_for = backoff.mul_f64(jitter.max(0.0));
        tokio::time::sleep(sleep_for).await;
        backoff = std::cmp::min(backoff.mul_f64(config.multiplier), config.max_backoff);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_config() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            multiplier: 2.0,
            jitter_factor: 0.0,
            timeout: Duration::from_millis(50),
            circuit_failure_threshold: 5,
            circuit_reset_after: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_config(), "test_op", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(ProviderError::RetryableTransient("flaky".into()))
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_fails_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<i32, _> = with_retry(&fast_config(), "test_op", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::NonRetryable("bad request".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let result: Result<i32, _> = with_retry(&fast_config(), "test_op", || async {
            Err(ProviderError::RetryableTransient("always flaky".into()))
        })
        .await;
        assert!(result.is_err());
    }
}
