//! Bounded retry with exponential backoff for external calls.

use std::future::Future;
use std::time::Duration;

use crate::errors::{ServiceError, ServiceResult};

/// Retry configuration for external calls.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Ceiling on any single delay.
    pub max_delay: Duration,
    /// Backoff multiplier.
    pub backoff_multiplier: f64,
    /// Budget for each individual attempt.
    pub call_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Calculate the delay before retry number `attempt` (0-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt.min(10)).unwrap_or(10);
        let multiplier = self.backoff_multiplier.powi(exp);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;
        let capped = delay_secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Check if another attempt is allowed after `attempt` attempts have failed.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }

    /// Total attempts this configuration allows.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// Each attempt is capped by `call_timeout`; an elapsed attempt counts as
    /// a transient [`ServiceError::Timeout`].
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> ServiceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt = attempt.saturating_add(1);
            let result = match tokio::time::timeout(self.call_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(ServiceError::Timeout(self.call_timeout.as_secs())),
            };

            match result {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(operation, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() && self.should_retry(attempt) => {
                    let delay = self.delay_for_attempt(attempt - 1);
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts(),
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::warn!(operation, attempt, error = %e, "Giving up");
                    return Err(e);
                }
            }
        }
    }
}
