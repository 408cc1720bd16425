// src/ingest/retry.rs
//! Bounded retry with exponential backoff for platform calls.
//!
//! Only errors that say so via [`CollectorError::is_retryable`] are retried;
//! everything else is returned on the spot. A rate-limit answer carrying
//! `Retry-After` waits that long instead (still capped at `max_delay`).

use std::future::Future;
use std::time::Duration;

use crate::config::RetrySettings;
use crate::error::CollectorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(s: &RetrySettings) -> Self {
        Self {
            max_attempts: s.max_attempts.max(1),
            base_delay: Duration::from_millis(s.base_delay_ms),
            max_delay: Duration::from_millis(s.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` starts at 1.
    pub fn backoff(&self, attempt: u32, err: &CollectorError) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(1u32 << (attempt.saturating_sub(1)).min(16));
        let wait = match err {
            CollectorError::RateLimited {
                retry_after: Some(secs),
            } => Duration::from_secs(*secs).max(exp),
            _ => exp,
        };
        wait.min(self.max_delay)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent. The last error is returned.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, CollectorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CollectorError>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                let wait = policy.backoff(attempt, &e);
                tracing::warn!(
                    target: "collector",
                    error = %e,
                    what,
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    "retrying"
                );
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }
            }
            Err(e) => return Err(e),
        }
    }
}
