//! Retry with exponential back-off and jitter for single gateway requests.
//!
//! Only network-level failures and 5xx answers are retried here. Rate-limit
//! signals never reach this layer as errors, and authentication or
//! access-denied answers are returned immediately.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::TelegramError;

const MAX_DELAY_MS: u64 = 60_000;

/// Returns `true` for errors that are worth retrying after a back-off delay.
pub(crate) fn is_retriable(err: &TelegramError) -> bool {
    match err {
        TelegramError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        TelegramError::Api { code, .. } => (500..600).contains(code),
        TelegramError::Authentication(_)
        | TelegramError::AccessDenied { .. }
        | TelegramError::Deserialize { .. }
        | TelegramError::Io { .. }
        | TelegramError::InvalidBaseUrl { .. }
        | TelegramError::NotConnected => false,
    }
}

/// How many times a transient failure is retried and how long to wait between
/// attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    pub(crate) max_retries: u32,
    pub(crate) base_delay_ms: u64,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based), scaled by `jitter`.
    ///
    /// The un-jittered delay doubles per retry from `base_delay_ms` and never
    /// exceeds [`MAX_DELAY_MS`]. `jitter` is expected in `0.75..=1.25`.
    pub(crate) fn delay(&self, retry: u32, jitter: f64) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        let nominal = self
            .base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(MAX_DELAY_MS);
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let jittered = (nominal as f64 * jitter).max(0.0) as u64;
        Duration::from_millis(jittered)
    }
}

fn jitter() -> f64 {
    rand::rng().random_range(0.75..=1.25)
}

/// Runs `operation`, retrying transient failures per `policy`. The last error
/// is returned once retries run out; non-transient errors return at once.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, TelegramError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TelegramError>>,
{
    let mut retry = 0u32;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if retry == policy.max_retries || !is_retriable(&err) {
            return Err(err);
        }
        retry += 1;
        let wait = policy.delay(retry, jitter());
        tracing::warn!(
            retry,
            max_retries = policy.max_retries,
            wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "gateway request failed, backing off"
        );
        tokio::time::sleep(wait).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    fn no_wait(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay_ms: 0,
        }
    }

    fn api_err(code: i64) -> TelegramError {
        TelegramError::Api {
            code,
            description: "boom".to_owned(),
        }
    }

    #[test]
    fn server_errors_are_retriable() {
        assert!(is_retriable(&api_err(502)));
    }

    #[test]
    fn client_errors_are_not_retriable() {
        assert!(!is_retriable(&api_err(400)));
    }

    #[test]
    fn auth_and_access_denied_are_not_retriable() {
        assert!(!is_retriable(&TelegramError::Authentication(
            "bad token".to_owned()
        )));
        assert!(!is_retriable(&TelegramError::AccessDenied {
            channel: "chemed".to_owned(),
            reason: "CHANNEL_PRIVATE".to_owned(),
        }));
    }

    #[test]
    fn delay_doubles_per_retry() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay_ms: 1_000,
        };
        assert_eq!(policy.delay(1, 1.0), Duration::from_secs(1));
        assert_eq!(policy.delay(2, 1.0), Duration::from_secs(2));
        assert_eq!(policy.delay(3, 1.0), Duration::from_secs(4));
    }

    #[test]
    fn delay_is_capped_and_jittered() {
        let policy = RetryPolicy {
            max_retries: 50,
            base_delay_ms: 1_000,
        };
        assert_eq!(policy.delay(40, 1.0), Duration::from_secs(60));
        assert_eq!(policy.delay(1, 0.75), Duration::from_millis(750));
        assert_eq!(policy.delay(1, 1.25), Duration::from_millis(1_250));
    }

    #[test]
    fn delay_survives_huge_base() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay_ms: u64::MAX,
        };
        assert_eq!(policy.delay(3, 1.0), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(no_wait(3), || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, TelegramError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(no_wait(3), || {
            let c = Arc::clone(&c);
            async move {
                let attempt = c.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 {
                    Err::<u32, _>(api_err(503))
                } else {
                    Ok(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(no_wait(2), || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(api_err(500))
            }
        })
        .await;
        assert!(matches!(result, Err(TelegramError::Api { code: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3, "1 try + 2 retries");
    }

    #[tokio::test]
    async fn does_not_retry_authentication() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(no_wait(3), || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(TelegramError::Authentication("nope".to_owned()))
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(TelegramError::Authentication(_))));
    }
}
