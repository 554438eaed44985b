//! Retry with exponential backoff for transient backend failures.

use crate::config::RetryPolicy;
use crate::remote::RemoteResult;
use log::warn;
use std::future::Future;

/// Runs `call` until it succeeds, fails terminally, or attempts run out.
///
/// Only `RemoteErrorKind::Unavailable` is retried.
pub(crate) async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    op: &'static str,
    mut call: F,
) -> RemoteResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RemoteResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match call().await {
            Err(err) if err.kind.is_retryable() && attempt < max_attempts => {
                let delay = policy.backoff_for(attempt);
                warn!(
                    "event=remote_retry module=service op={op} attempt={attempt} max_attempts={max_attempts} delay_ms={} error={}",
                    delay.as_millis(),
                    err.detail
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            outcome => return outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::with_retry;
    use crate::config::RetryPolicy;
    use crate::remote::{RemoteError, RemoteErrorKind};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    #[tokio::test]
    async fn unavailable_is_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(3), "flaky_op", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(RemoteError::unavailable("down"))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn terminal_kinds_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(5), "flaky_op", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(RemoteError::conflict("dup"))
        })
        .await;
        assert_eq!(result.unwrap_err().kind, RemoteErrorKind::Conflict);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(2), "flaky_op", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(RemoteError::unavailable("down"))
        })
        .await;
        assert_eq!(result.unwrap_err().kind, RemoteErrorKind::Unavailable);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
