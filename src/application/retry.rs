//! Retry schedules for calls to external systems.
//!
//! Every step that talks to Stripe, the database or the cloud admin API declares a
//! [`RetryPolicy`]. Only errors for which [`AppError::is_retryable`] holds are repeated;
//! permanent failures end the step on the first attempt.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio_retry::RetryIf;
use tracing::warn;

use crate::app_error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the second attempt.
    pub interval: Duration,
    /// Total number of attempts, including the first one.
    pub max_attempts: usize,
    /// Multiplier applied to the delay after each failed retry.
    pub backoff_rate: f64,
}

impl RetryPolicy {
    pub const fn new(interval: Duration, max_attempts: usize, backoff_rate: f64) -> Self {
        Self {
            interval,
            max_attempts,
            backoff_rate,
        }
    }

    pub const fn no_retry() -> Self {
        Self::new(Duration::ZERO, 1, 1.0)
    }

    /// Delays slept between consecutive attempts.
    pub fn delays(&self) -> Vec<Duration> {
        (0..self.max_attempts.saturating_sub(1))
            .map(|i| self.interval.mul_f64(self.backoff_rate.powi(i as i32)))
            .collect()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 3, 2.0)
    }
}

/// Run `action` until it succeeds, fails permanently, or the policy is exhausted.
///
/// The error of the last attempt is returned when all attempts fail.
pub async fn with_retry<T, A, Fut>(
    policy: &RetryPolicy,
    step: &'static str,
    mut action: A,
) -> AppResult<T>
where
    A: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let attempt = AtomicUsize::new(0);
    let max_attempts = policy.max_attempts;

    RetryIf::start(
        policy.delays(),
        || {
            attempt.fetch_add(1, Ordering::Relaxed);
            action()
        },
        |err: &AppError| {
            let retryable = err.is_retryable();
            let current = attempt.load(Ordering::Relaxed);
            if retryable && current < max_attempts {
                warn!(step, attempt = current, max_attempts, error = %err, "Step failed, retrying");
            }
            retryable
        },
    )
    .await
}
