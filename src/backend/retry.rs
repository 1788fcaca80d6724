//! Bounded exponential-backoff retry for transient backend failures.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use tracing::{debug, warn};

use super::error::BackendError;

/// Total attempts per call, including the first.
pub const MAX_ATTEMPTS: u32 = 3;

/// Wait before the second attempt; doubles after every failure.
pub const INITIAL_INTERVAL: Duration = Duration::from_secs(1);

const MULTIPLIER: f64 = 2.0;
const MAX_INTERVAL: Duration = Duration::from_secs(30);

/// Retry policy wrapping one network call.
///
/// Retryable failures (see [`BackendError::is_retryable`]) are retried with
/// waits of 1s, 2s, 4s, ... up to `max_attempts` total attempts. Fatal
/// failures are returned immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Wait before the second attempt.
    pub initial_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            initial_interval: INITIAL_INTERVAL,
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_randomization_factor(0.0)
            .with_multiplier(MULTIPLIER)
            .with_max_interval(MAX_INTERVAL)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Runs `attempt` until it succeeds, fails fatally, or attempts run out.
    ///
    /// `operation` labels the call in log output.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T, BackendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut backoff = self.backoff();
        let mut attempts = 0;

        loop {
            attempts += 1;

            match attempt().await {
                Ok(value) => {
                    if attempts > 1 {
                        debug!(operation, attempts, "Backend call recovered after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => {
                    debug!(operation, attempt = attempts, error = %e, "Fatal backend error, not retrying");
                    return Err(e);
                }
                Err(e) if attempts >= max_attempts => {
                    return Err(BackendError::RetriesExhausted {
                        attempts,
                        source: Box::new(e),
                    });
                }
                Err(e) => {
                    let wait = backoff.next_backoff().unwrap_or(self.initial_interval);
                    warn!(
                        operation,
                        attempt = attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "Transient backend failure, retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use tokio::time::Instant;

    use super::*;

    fn status_error(status: u16) -> BackendError {
        BackendError::ApiRequestFailed {
            provider: "Mock".to_string(),
            status,
            message: "err".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_first_attempt_without_waiting() {
        let start = Instant::now();
        let result = RetryPolicy::default()
            .run("test", || async { Ok::<_, BackendError>("ok") })
            .await;
        assert_eq!(result.unwrap(), "ok");
        assert!(start.elapsed() < INITIAL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_three_transient_failures() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        let start = Instant::now();

        let result: Result<(), _> = RetryPolicy::default()
            .run("test", move || {
                let c = counter.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(status_error(503))
                }
            })
            .await;

        assert!(matches!(
            result,
            Err(BackendError::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(count.load(Ordering::SeqCst), 3);
        // 1s before attempt 2, 2s before attempt 3
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4),
            "unexpected elapsed {elapsed:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_is_not_retried() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();

        let result: Result<(), _> = RetryPolicy::default()
            .run("test", move || {
                let c = counter.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(status_error(400))
                }
            })
            .await;

        assert!(matches!(
            result,
            Err(BackendError::ApiRequestFailed { status: 400, .. })
        ));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_rate_limit() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();

        let result = RetryPolicy::default()
            .run("test", move || {
                let c = counter.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(status_error(429))
                    } else {
                        Ok("recovered")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_tries_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        let result: Result<(), _> = policy
            .run("test", || async { Err(BackendError::NetworkError("down".to_string())) })
            .await;
        assert!(matches!(
            result,
            Err(BackendError::RetriesExhausted { attempts: 1, .. })
        ));
    }
}
