use std::future::Future;
use tracing::warn;

use crate::{BlobResult, RetryPolicy};

/// Run a retry-safe storage operation with bounded, doubling backoff.
///
/// Only transient errors are retried; anything else escalates immediately.
/// Callers must guarantee the operation is idempotent (stream opens and
/// fully buffered part uploads are; mid-stream reads are not).
pub(crate) async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    what: &'static str,
    mut op: F,
) -> BlobResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BlobResult<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                let backoff = policy.backoff_after(attempt);
                warn!(error = %err, attempt, operation = what, "transient storage error, backing off");
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BlobError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn retries_transient_errors_up_to_the_attempt_budget() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result: BlobResult<u32> = with_retry(&policy, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(BlobError::transient("blip"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result: BlobResult<()> = with_retry(&policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(BlobError::not_found("b", "k")) }
        })
        .await;

        assert!(matches!(result, Err(BlobError::NotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_last_error() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result: BlobResult<()> = with_retry(&policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(BlobError::transient("still down")) }
        })
        .await;

        assert!(matches!(result, Err(BlobError::Transient { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
