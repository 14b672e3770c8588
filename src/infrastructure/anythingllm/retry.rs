use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::errors::AuthError;
use crate::domain::models::Config;

/// Upper bound on a single backoff
const MAX_BACKOFF_MS: u64 = 30_000;

/// Exponential backoff for transient API failures
///
/// Clients never retry on their own; wrap a call in [`execute`](Self::execute)
/// or [`execute_blocking`](Self::execute_blocking) to opt in. Only
/// [transient](AuthError::is_transient) errors are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    max_retries: u32,
    /// Initial backoff duration in milliseconds
    initial_backoff_ms: u64,
    /// Maximum backoff duration in milliseconds
    max_backoff_ms: u64,
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// `max_backoff_ms` is raised to `initial_backoff_ms` if lower.
    pub fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff_ms,
            max_backoff_ms: max_backoff_ms.max(initial_backoff_ms),
        }
    }

    /// Policy from `max_retries` and `retry_delay_ms`
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_retries, config.retry_delay_ms, MAX_BACKOFF_MS)
    }

    /// Maximum number of retry attempts
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Execute an async operation, retrying transient failures
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, AuthError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AuthError>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "operation succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(err) if self.should_retry(&err, attempt) => {
                    let backoff = self.calculate_backoff(attempt);
                    warn!(attempt = attempt + 1, error = %err, ?backoff, "transient error, retrying");
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => {
                    debug!(attempts = attempt + 1, error = %err, "giving up");
                    return Err(err);
                }
            }
        }
    }

    /// Blocking counterpart of [`execute`](Self::execute)
    pub fn execute_blocking<F, T>(&self, mut operation: F) -> Result<T, AuthError>
    where
        F: FnMut() -> Result<T, AuthError>,
    {
        let mut attempt = 0;

        loop {
            match operation() {
                Ok(result) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "operation succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(err) if self.should_retry(&err, attempt) => {
                    let backoff = self.calculate_backoff(attempt);
                    warn!(attempt = attempt + 1, error = %err, ?backoff, "transient error, retrying");
                    std::thread::sleep(backoff);
                    attempt += 1;
                }
                Err(err) => {
                    debug!(attempts = attempt + 1, error = %err, "giving up");
                    return Err(err);
                }
            }
        }
    }

    /// Formula: min(initial_backoff * 2^attempt, max_backoff)
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let backoff_ms = self
            .initial_backoff_ms
            .saturating_mul(2_u64.saturating_pow(attempt))
            .min(self.max_backoff_ms);

        Duration::from_millis(backoff_ms)
    }

    fn should_retry(&self, error: &AuthError, attempt: u32) -> bool {
        attempt < self.max_retries && error.is_transient()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 1_000, MAX_BACKOFF_MS)
    }
}
