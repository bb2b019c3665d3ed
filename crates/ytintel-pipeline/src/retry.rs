//! Bounded retry with exponential back-off, jitter, and cancellation.
//!
//! [`retry_with_backoff`] wraps any fallible async operation and retries on
//! errors that classify as [`Retryability::Transient`]. Permanent errors
//! (not found, invalid request, quota exceeded) are returned immediately so
//! they never burn more budget.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use ytintel_core::FetchError;

use crate::error::PipelineError;

const MAX_DELAY_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retryability {
    Transient,
    Permanent,
}

/// Errors that know whether another attempt could succeed.
pub trait Classify {
    fn classify(&self) -> Retryability;

    /// The error an attempt produces when it outlives its timeout.
    fn timed_out(after: Duration) -> Self;
}

impl Classify for FetchError {
    fn classify(&self) -> Retryability {
        if self.is_transient() {
            Retryability::Transient
        } else {
            Retryability::Permanent
        }
    }

    fn timed_out(after: Duration) -> Self {
        FetchError::Unavailable(format!("timed out after {}ms", after.as_millis()))
    }
}

impl Classify for PipelineError {
    fn classify(&self) -> Retryability {
        match self {
            PipelineError::UpstreamUnavailable(_) => Retryability::Transient,
            _ => Retryability::Permanent,
        }
    }

    fn timed_out(after: Duration) -> Self {
        PipelineError::UpstreamUnavailable(format!("timed out after {}ms", after.as_millis()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    /// Upper bound on each individual attempt.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base_ms: 500,
            attempt_timeout: None,
        }
    }
}

impl RetryPolicy {
    /// Un-jittered delay before retry number `retry` (1-based), capped at 30 s.
    #[must_use]
    pub fn base_delay(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(16);
        let computed = self.backoff_base_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(computed.min(MAX_DELAY_MS))
    }

    fn jittered_delay(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let ms = (base.as_millis() as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
        Duration::from_millis(ms)
    }
}

#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Failed(E),
}

/// Runs `operation` with up to `policy.max_retries` additional attempts on
/// transient errors.
///
/// Back-off schedule with `backoff_base_ms = 500`:
///
/// | Retry | Sleep before it            |
/// |-------|----------------------------|
/// | 1     | 500 ms × 2⁰ ± 25 % jitter  |
/// | 2     | 500 ms × 2¹ ± 25 % jitter  |
/// | 3     | 500 ms × 2² ± 25 % jitter  |
///
/// `cancel` is observed while an attempt is in flight and while sleeping;
/// either way the in-flight future is dropped and
/// [`RetryError::Cancelled`] is returned.
///
/// # Errors
///
/// [`RetryError::Failed`] with the last error once it is permanent or the
/// attempts are used up.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    E: Classify + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut retry = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(RetryError::Cancelled),
            outcome = run_attempt(policy.attempt_timeout, operation()) => outcome,
        };

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if err.classify() == Retryability::Permanent || retry >= policy.max_retries {
            return Err(RetryError::Failed(err));
        }

        retry += 1;
        let delay = policy.jittered_delay(retry);
        tracing::warn!(
            attempt = retry,
            max_retries = policy.max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "transient upstream error, retrying after back-off"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(RetryError::Cancelled),
            () = tokio::time::sleep(delay) => {}
        }
    }
}

async fn run_attempt<T, E, Fut>(timeout: Option<Duration>, attempt: Fut) -> Result<T, E>
where
    E: Classify,
    Fut: Future<Output = Result<T, E>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, attempt)
            .await
            .unwrap_or_else(|_| Err(E::timed_out(limit))),
        None => attempt.await,
    }
}
