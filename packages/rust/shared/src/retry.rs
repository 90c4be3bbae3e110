//! Capped exponential backoff for external calls.
//!
//! Every external client (CRM, news, summarizer) routes its calls through
//! [`with_backoff`] so that rate-limit handling is uniform: a 429 waits at
//! least the server's `Retry-After`, otherwise the delay doubles from a
//! base up to a ceiling. Errors that are not retryable return immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::{BriefError, Result};

/// Backoff parameters shared by all external clients.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// First delay after a rate-limit response with no `Retry-After`.
    pub rate_limit_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            rate_limit_delay: Duration::from_millis(1_500),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before attempt `attempt + 1`, given the error that ended `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32, err: &BriefError) -> Duration {
        let base = if err.is_rate_limit() {
            self.rate_limit_delay
        } else {
            self.base_delay
        };
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let backoff = base.saturating_mul(factor).min(self.max_delay);

        match err.retry_after() {
            Some(hint) => backoff.max(hint.min(self.max_delay)),
            None => backoff,
        }
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are exhausted. The last error is returned.
pub async fn with_backoff<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = policy.delay_for(attempt, &err);
                tracing::debug!(
                    label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying external call"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                if err.is_retryable() {
                    tracing::warn!(label, attempts = attempt, error = %err, "retries exhausted");
                }
                return Err(err);
            }
        }
    }
}
