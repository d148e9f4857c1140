//! Retry logic for external calls and SQLite writes
//!
//! `with_retry` wraps search/fetch calls: exponential backoff, transient
//! failures only. `retry_on_lock` wraps registry writes: short backoff on
//! "database is locked" until a wall-clock ceiling.

use crate::config::RetryPolicy;
use crate::error::ResolveError;
use crate::services::UpstreamError;
use primsrc_common::{Error, Result};
use std::future::Future;
use std::time::{Duration, Instant};

/// Upstream call that failed for good
#[derive(Debug, Clone)]
pub struct RetryExhausted {
    pub service: String,
    pub attempts: u32,
    pub last_error: UpstreamError,
}

impl RetryExhausted {
    /// True when the last failure was transport-level (worth surfacing as
    /// `UpstreamUnavailable` rather than a per-candidate issue)
    pub fn is_transient(&self) -> bool {
        self.last_error.is_transient()
    }
}

impl From<RetryExhausted> for ResolveError {
    fn from(exhausted: RetryExhausted) -> Self {
        ResolveError::UpstreamUnavailable {
            service: exhausted.service,
            attempts: exhausted.attempts,
            last_error: exhausted.last_error,
        }
    }
}

/// Run `operation` up to `policy.max_attempts` times
///
/// Only transient errors (timeouts, connection failures, gateway statuses)
/// are retried; anything else returns after the first attempt.
pub async fn with_retry<F, Fut, T>(
    service: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> std::result::Result<T, RetryExhausted>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, UpstreamError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(service, attempt, "Upstream call succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                if !err.is_transient() || attempt >= max_attempts {
                    if err.is_transient() {
                        tracing::error!(
                            service,
                            attempt,
                            error = %err,
                            "Upstream call failed: retries exhausted"
                        );
                    } else {
                        tracing::debug!(service, error = %err, "Upstream call failed (not retryable)");
                    }
                    return Err(RetryExhausted {
                        service: service.to_string(),
                        attempts: attempt,
                        last_error: err,
                    });
                }

                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    service,
                    attempt,
                    backoff_ms = delay.as_millis() as u64,
                    error = %err,
                    "Upstream call failed, will retry after backoff"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Retry a database operation while SQLite reports lock contention
///
/// Backoff starts at 10ms and doubles up to 1s. Gives up once `max_wait_ms`
/// has elapsed; other errors return immediately.
pub async fn retry_on_lock<F, Fut, T>(operation_name: &str, max_wait_ms: u64, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start_time = Instant::now();
    let max_duration = Duration::from_millis(max_wait_ms);
    let mut attempt = 0;
    let mut backoff_ms = 10u64;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Database operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !err.is_lock_contention() {
                    return Err(err);
                }

                let elapsed = start_time.elapsed();
                if elapsed >= max_duration {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        max_wait_ms,
                        "Database operation failed: max retry time exceeded"
                    );
                    return Err(Error::Internal(format!(
                        "Database locked after {} attempts ({} ms elapsed, max {} ms)",
                        attempt,
                        elapsed.as_millis(),
                        max_wait_ms
                    )));
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms,
                    "Database locked, will retry after backoff"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(1000);
            }
        }
    }
}
