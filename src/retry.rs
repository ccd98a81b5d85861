//! Bounded retry around a single site call.
//!
//! Failures never escape this boundary: callers get a [`RetryOutcome`] and
//! classify an exhausted call as a connection error.

use std::future::Future;
use std::time::Duration;

use tokio_retry::Retry;
use tokio_retry::strategy::FixedInterval;

use crate::config::ScraperConfig;
use crate::utils::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
    /// Upper bound for a single attempt, including its navigation.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(5000),
            attempt_timeout: None,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ScraperConfig, attempt_timeout: Option<Duration>) -> Self {
        Self {
            attempts: config.retry_attempts.max(1),
            backoff: Duration::from_millis(config.retry_delay_ms),
            attempt_timeout,
        }
    }

    fn delays(&self) -> impl Iterator<Item = Duration> {
        let backoff_ms = self.backoff.as_millis() as u64;
        FixedInterval::from_millis(backoff_ms).take(self.attempts.saturating_sub(1) as usize)
    }
}

#[derive(Debug)]
pub enum RetryOutcome<T> {
    Succeeded { value: T, attempts: u32 },
    Exhausted { attempts: u32, last_error: AppError },
}

impl<T> RetryOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Succeeded { attempts, .. } | RetryOutcome::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn into_result(self) -> Result<T, AppError> {
        match self {
            RetryOutcome::Succeeded { value, .. } => Ok(value),
            RetryOutcome::Exhausted { last_error, .. } => Err(last_error),
        }
    }
}

/// Runs `operation` up to `policy.attempts` times, sleeping `policy.backoff`
/// between failed attempts. A timed-out attempt counts as a failure.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut operation: F) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let max_attempts = policy.attempts.max(1);
    let attempt_timeout = policy.attempt_timeout;
    let mut attempts = 0u32;

    let result = Retry::start(policy.delays(), || {
        attempts += 1;
        let attempt = attempts;
        let call = operation();
        async move {
            let result = match attempt_timeout {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(result) => result,
                    Err(_) => Err(AppError::connection(format!("attempt timed out after {:?}", limit))),
                },
                None => call.await,
            };

            if let Err(e) = &result {
                tracing::warn!(label, attempt, max_attempts, error = %e, "Attempt failed");
            }
            result
        }
    })
    .await;

    match result {
        Ok(value) => RetryOutcome::Succeeded { value, attempts },
        Err(e) => {
            tracing::error!(label, attempts, error = %e, "All attempts failed");
            let last_error = match e {
                AppError::Connection(_) => e,
                other => AppError::connection(other.to_string()),
            };
            RetryOutcome::Exhausted { attempts, last_error }
        }
    }
}
