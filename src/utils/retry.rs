use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::store::StoreError;

// ============================================================================
// Exponential Backoff Retry
// ============================================================================
//
// Used while bringing up infrastructure (the database pool). Order writes are
// never retried here: a failed acceptance goes back to the admin unchanged.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor applied after each failure
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Startup connection policy: `attempts` tries, starting at 500ms
    pub fn startup(attempts: u32) -> Self {
        Self {
            max_attempts: attempts.max(1),
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
        }
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        Duration::from_millis(((delay.as_millis() as f64) * self.multiplier) as u64).min(self.max_delay)
    }
}

#[derive(Debug)]
pub enum RetryResult<T, E> {
    Success(T),
    /// Still failing after every attempt
    Failed(E),
    /// Failed with an error retrying cannot fix
    PermanentFailure(E),
}

impl<T, E> RetryResult<T, E> {
    pub fn into_result(self) -> Result<T, E> {
        match self {
            RetryResult::Success(value) => Ok(value),
            RetryResult::Failed(error) | RetryResult::PermanentFailure(error) => Err(error),
        }
    }
}

/// Whether an error may clear up on its own
pub trait IsTransient {
    fn is_transient(&self) -> bool;
}

impl IsTransient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Aborted(_))
    }
}

/// Retry every failure until attempts run out
pub async fn retry_with_backoff<F, Fut, T, E>(config: RetryConfig, operation: F) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    run(config, operation, |_: &E| true).await
}

/// Retry only transient failures; anything else returns immediately
pub async fn retry_on_transient<F, Fut, T, E>(config: RetryConfig, operation: F) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display + IsTransient,
{
    run(config, operation, |error: &E| error.is_transient()).await
}

async fn run<F, Fut, T, E, R>(config: RetryConfig, mut operation: F, retryable: R) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: Fn(&E) -> bool,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Operation succeeded after retry");
                }
                return RetryResult::Success(result);
            }
            Err(error) if !retryable(&error) => {
                tracing::error!(error = %error, "Permanent failure, not retrying");
                return RetryResult::PermanentFailure(error);
            }
            Err(error) if attempt >= config.max_attempts => {
                tracing::error!(attempt, error = %error, "Operation failed after all retries");
                return RetryResult::Failed(error);
            }
            Err(error) => {
                tracing::warn!(
                    attempt,
                    max_attempts = config.max_attempts,
                    error = %error,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying after delay"
                );
                sleep(delay).await;
                delay = config.next_delay(delay);
            }
        }
    }
}
