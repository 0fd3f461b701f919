//! Timeout and bounded retry for external calls.
//!
//! Each attempt runs under its own deadline. Retryable failures back off
//! exponentially with random jitter; a rate-limit response waits at least
//! as long as the server asked.

use crate::error::{ProfilerError, Result};
use rand::Rng;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Wait assumed when a 429 carries no usable Retry-After header
pub const DEFAULT_RATE_LIMIT_WAIT_SECS: u64 = 5;

/// Seconds a rate-limited response asks the client to wait.
pub fn retry_after_secs(headers: &HeaderMap) -> u64 {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_RATE_LIMIT_WAIT_SECS)
}

/// Retry settings shared by all HTTP collaborators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Deadline for a single attempt
    pub timeout_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            timeout_secs: 60,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting. Used by tests.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
            timeout_secs: 30,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Backoff before attempt `attempt + 1`, without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// attempts are exhausted. `what` labels log events.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let deadline = self.timeout();
        let mut attempt = 0;

        loop {
            let outcome = match tokio::time::timeout(deadline, op()).await {
                Ok(result) => result,
                Err(_) => Err(ProfilerError::Timeout(deadline)),
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            attempt += 1;
            if attempt >= attempts || !err.is_retryable() {
                debug!(what, attempt, error = %err, "Giving up");
                return Err(err);
            }

            let mut wait = self.backoff(attempt - 1);
            if let ProfilerError::RateLimited(secs) = &err {
                wait = wait.max(Duration::from_secs(*secs));
            }
            if !wait.is_zero() {
                let jitter_cap = (wait.as_millis() as u64 / 4).max(1);
                wait += Duration::from_millis(rand::thread_rng().gen_range(0..jitter_cap));
            }

            warn!(
                what,
                attempt,
                max_attempts = attempts,
                wait_ms = wait.as_millis() as u64,
                error = %err,
                "Request failed, retrying"
            );
            tokio::time::sleep(wait).await;
        }
    }
}
