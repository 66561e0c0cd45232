//! Async retry with exponential backoff

use std::time::Duration;

/// Backoff before the attempt following `attempt` (1-based): `base * 2^(attempt-1)`
pub fn backoff_delay(base_delay_ms: u64, attempt: u32) -> Duration {
    let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(base_delay_ms.saturating_mul(factor))
}

/// Retry an async operation with exponential backoff.
///
/// Returns `Ok((value, attempts))` on success, or `Err((error, attempts))` once
/// `max_attempts` operations have failed.
pub async fn retry_with_backoff_async<F, Fut, T, E>(
    max_attempts: u32,
    base_delay_ms: u64,
    mut operation: F,
) -> Result<(T, u32), (E, u32)>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match operation().await {
            Ok(value) => return Ok((value, attempts)),
            Err(e) => {
                if attempts >= max_attempts {
                    return Err((e, attempts));
                }
                let delay = backoff_delay(base_delay_ms, attempts);
                tracing::warn!(
                    error = %e,
                    attempt = attempts,
                    delay_ms = delay.as_millis(),
                    "Retrying after store error"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_delay_doubles() {
        assert_eq!(backoff_delay(100, 1), Duration::from_millis(100));
        assert_eq!(backoff_delay(100, 2), Duration::from_millis(200));
        assert_eq!(backoff_delay(100, 3), Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_delay_saturates() {
        assert_eq!(backoff_delay(u64::MAX, 10), Duration::from_millis(u64::MAX));
    }

    #[tokio::test]
    async fn test_success_on_first_try() {
        let result = retry_with_backoff_async(3, 1, || async { Ok::<_, &str>(7) }).await;
        assert_eq!(result, Ok((7, 1)));
    }

    #[tokio::test]
    async fn test_success_after_retry() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff_async(3, 1, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 2 {
                    Err("transient error")
                } else {
                    Ok(true)
                }
            }
        })
        .await;
        assert_eq!(result, Ok((true, 2)));
    }

    #[tokio::test]
    async fn test_failure_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff_async(3, 1, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("persistent error") }
        })
        .await;
        let (error, attempts) = result.unwrap_err();
        assert_eq!(error, "persistent error");
        assert_eq!(attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_single_attempt_does_not_sleep() {
        let result = retry_with_backoff_async(1, 60_000, || async { Err::<(), _>("down") }).await;
        assert_eq!(result, Err(("down", 1)));
    }
}
