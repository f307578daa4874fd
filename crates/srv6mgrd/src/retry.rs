//! Bounded retry with backoff for individual store operations.
//!
//! Retries are scoped to one table operation at a time, never to a whole
//! reconciliation batch: a binding that keeps failing is reported in the
//! run's [`ReconcileReport`](crate::error::ReconcileReport) and retried on
//! the next trigger instead.

use srv6_sidtable::SidTableError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Attempts per operation before giving up for this run.
pub const MAX_ATTEMPTS: u32 = 3;

/// Initial delay between attempts; doubles each retry.
pub const BASE_DELAY: Duration = Duration::from_millis(10);

/// Runs `call` until it succeeds, fails non-transiently, or exhausts
/// [`MAX_ATTEMPTS`].
pub async fn with_backoff<T, F, Fut>(operation: &str, mut call: F) -> Result<T, SidTableError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SidTableError>>,
{
    let mut delay = BASE_DELAY;
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                debug!(operation, attempt, "transient store failure, retrying");
                sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = with_backoff("store", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(SidTableError::transient("store"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_backoff("store", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(SidTableError::transient("store")) }
        })
        .await;

        assert!(result.unwrap_err().is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_backoff("delete", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(SidTableError::NotFound) }
        })
        .await;

        assert_eq!(result.unwrap_err(), SidTableError::NotFound);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
