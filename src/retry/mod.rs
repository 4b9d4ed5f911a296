//! Retry - bounded retry for idempotent remote calls
//!
//! ## Responsibilities
//!
//! - Re-invoke a failing task a fixed number of times
//! - Fixed delay between attempts (no jitter, no backoff)
//! - Surface the final error unchanged
//!
//! Only wrap calls that are safe to repeat: listings, existence checks,
//! uploads of objects that have not been confirmed yet.

use std::future::Future;
use std::time::Duration;

/// Default number of attempts
pub const DEFAULT_ATTEMPTS: u32 = 10;

/// Default delay between attempts (5 seconds)
pub const DEFAULT_INTERVAL_SECS: u64 = 5;

/// Retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub attempts: u32,
    /// Delay between attempts
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            interval,
        }
    }

    /// Single attempt, no delay
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ATTEMPTS, Duration::from_secs(DEFAULT_INTERVAL_SECS))
    }
}

/// Run `task` until it succeeds or the policy's attempts are used up.
///
/// The error of the last attempt is returned as-is.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut task: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match task().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= policy.attempts => {
                tracing::error!(
                    attempt = attempt,
                    max_attempts = policy.attempts,
                    error = %e,
                    "Retry budget exhausted"
                );
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(
                    attempt = attempt,
                    max_attempts = policy.attempts,
                    error = %e,
                    "Attempt failed, retrying"
                );
                attempt += 1;
                tokio::time::sleep(policy.interval).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts, 10);
        assert_eq!(policy.interval, Duration::from_secs(5));
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts, 1);
    }

    #[tokio::test]
    async fn test_returns_first_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::ZERO);

        let counter = &calls;

        let result: Result<u32, Error> = retry(&policy, move || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(Error::Internal(format!("attempt {}", n)))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_final_error_is_preserved() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(4, Duration::ZERO);

        let counter = &calls;

        let result: Result<(), Error> = retry(&policy, move || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Err(Error::cloud_status(503, format!("attempt {}", n)))
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(Error::RemoteProtocol { service, status, message }) => {
                assert_eq!(service, "cloud");
                assert_eq!(status, 503);
                assert_eq!(message, "attempt 4");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_between_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_secs(5));
        let start = tokio::time::Instant::now();

        let result: Result<(), Error> =
            retry(&policy, || async { Err(Error::Internal("down".into())) }).await;

        assert!(result.is_err());
        // two sleeps between three attempts
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }
}
