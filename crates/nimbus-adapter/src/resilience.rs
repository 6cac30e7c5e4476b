//! Resilience patterns for adapter calls
//!
//! Retry logic with exponential backoff and jitter. Only transient errors are
//! retried; permanent errors surface immediately so the reconciliation engine
//! can fail the resource.

use std::time::Duration;

use tracing::debug;

use crate::error::{AdapterError, AdapterResult};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Initial delay before first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Retry executor with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    /// Create a new retry executor with the given configuration.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Create a new retry executor with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Calculate delay for a given attempt (0-indexed).
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = self.config.initial_delay.as_millis() as f64
            * self.config.backoff_multiplier.powi(attempt as i32);

        let delay_ms = base_delay.min(self.config.max_delay.as_millis() as f64);

        let final_delay = if self.config.jitter {
            // Add up to 25% jitter
            let jitter_factor = 1.0 + (rand_simple() * 0.25);
            delay_ms * jitter_factor
        } else {
            delay_ms
        };

        Duration::from_millis(final_delay as u64)
    }

    /// Execute an operation with retries.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> AdapterResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = AdapterResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !e.is_transient() || attempt == self.config.max_retries {
                        return Err(e);
                    }

                    let delay = self.calculate_delay(attempt);
                    debug!(
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "Retrying after transient error"
                    );

                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| AdapterError::unavailable("max retries exceeded")))
    }
}

// Pseudo-random in [0, 1) without pulling in a crate; only used for jitter.
fn rand_simple() -> f64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let state = RandomState::new();
    let mut hasher = state.build_hasher();
    hasher.write_u64(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64,
    );
    (hasher.finish() as f64) / (u64::MAX as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let executor = RetryExecutor::new(fast_config());
        let result = executor.execute(|| async { Ok::<_, AdapterError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let executor = RetryExecutor::new(fast_config());
        let calls = Arc::new(AtomicU32::new(0));

        let calls_clone = calls.clone();
        let result = executor
            .execute(move || {
                let calls = calls_clone.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(AdapterError::unavailable("flaky"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let executor = RetryExecutor::new(fast_config());
        let calls = Arc::new(AtomicU32::new(0));

        let calls_clone = calls.clone();
        let result: AdapterResult<()> = executor
            .execute(move || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(AdapterError::AuthenticationFailed)
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_last_error() {
        let executor = RetryExecutor::new(fast_config());
        let calls = Arc::new(AtomicU32::new(0));

        let calls_clone = calls.clone();
        let result: AdapterResult<()> = executor
            .execute(move || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(AdapterError::Timeout { timeout_secs: 1 })
                }
            })
            .await;

        assert!(matches!(result, Err(AdapterError::Timeout { .. })));
        // 1 initial + 3 retries
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_calculate_delay_exponential_backoff() {
        let executor = RetryExecutor::new(fast_config());
        let d0 = executor.calculate_delay(0);
        let d1 = executor.calculate_delay(1);
        let d2 = executor.calculate_delay(2);
        assert_eq!(d0, Duration::from_millis(1));
        assert_eq!(d1, Duration::from_millis(2));
        assert_eq!(d2, Duration::from_millis(4));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let executor = RetryExecutor::new(fast_config());
        let d = executor.calculate_delay(10);
        assert_eq!(d, Duration::from_millis(5));
    }
}
