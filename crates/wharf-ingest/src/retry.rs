//! Bounded retry for upstream network calls
//!
//! The transactional core never retries; a failed artifact is rolled back
//! and reported. This combinator exists for the producer-side fetch code
//! that lands artifacts in the first place, where a flaky API call is
//! worth a few more attempts before giving up.

use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

/// Retry configuration for one wrapped operation
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first (at least one is always made)
    pub max_attempts: u32,
    /// Delay before retry `n` is `base_delay * n` (linear backoff)
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

/// Run `op` until it succeeds or the policy is exhausted.
///
/// Every error short of the final attempt is logged and retried after a
/// linearly growing delay; on the final attempt the error is returned
/// unchanged.
pub async fn with_retry<T, E, F, Fut>(
    policy: RetryPolicy,
    op_name: &str,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts => {
                let delay = policy.base_delay * attempt;
                warn!(
                    op = op_name,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_secs = delay.as_secs_f64(),
                    error = %err,
                    "operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            },
            Err(err) => {
                error!(
                    op = op_name,
                    attempts = attempt,
                    error = %err,
                    "all attempts failed"
                );
                return Err(err);
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<u32, String> = with_retry(policy(), "flaky", || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(format!("transient failure {n}"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_attempts_and_returns_final_error() {
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), String> = with_retry(policy(), "doomed", || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(format!("failure {n}"))
            }
        })
        .await;

        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_first_success_makes_one_call() {
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<&str, &str> = with_retry(policy(), "steady", || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("done")
            }
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
