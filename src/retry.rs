//! Bounded retry for calls the server rejects with a throttling status.

use anyhow::Result;
use log::{debug, warn};
use std::time::Duration;

use crate::http::ClientError;

/// Status the service uses to signal throttling.
pub const DEFAULT_RETRYABLE_STATUS: u16 = 429;

/// Total attempts (first call included) before a throttled call gives up.
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// Retries an operation while it fails with one specific HTTP status.
///
/// Only `ClientError::Transport` failures whose status equals
/// `retryable_status` are retried, and at most `max_attempts` calls are made in
/// total. Any other failure propagates after the first call. Backoff is off by
/// default; when enabled the delay doubles after every failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    retryable_status: u16,
    max_attempts: usize,
    backoff: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRYABLE_STATUS, DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one call.
    pub fn new(retryable_status: u16, max_attempts: usize) -> Self {
        Self {
            retryable_status,
            max_attempts: max_attempts.max(1),
            backoff: None,
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn never() -> Self {
        Self::new(DEFAULT_RETRYABLE_STATUS, 1)
    }

    #[must_use]
    pub fn with_backoff(mut self, base_delay: Duration) -> Self {
        self.backoff = Some(base_delay);
        self
    }

    pub fn retryable_status(&self) -> u16 {
        self.retryable_status
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    fn is_retryable(&self, error: &anyhow::Error) -> bool {
        matches!(
            error.downcast_ref::<ClientError>(),
            Some(ClientError::Transport { status, .. }) if *status == self.retryable_status
        )
    }

    /// Delay to wait after the given failed attempt (1-based).
    fn delay_after(&self, attempt: usize) -> Option<Duration> {
        let base = self.backoff?;
        let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX).min(16);
        Some(base.saturating_mul(1u32 << exponent))
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error, or
    /// the attempt budget is spent. The last error is returned unchanged.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if self.is_retryable(&e) && attempt < self.max_attempts => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        "{}: attempt {}/{} was throttled ({}), retrying{}...",
                        operation_name,
                        attempt,
                        self.max_attempts,
                        e,
                        delay
                            .map(|d| format!(" in {}ms", d.as_millis()))
                            .unwrap_or_default()
                    );
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(e) => {
                    if self.is_retryable(&e) {
                        debug!("{}: giving up after {} attempts", operation_name, attempt);
                    } else {
                        debug!("{}: non-retryable error: {}", operation_name, e);
                    }
                    return Err(e);
                }
            }
        }
    }
}
