use crate::domain::errors::{HistoryError, LedgerError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_retry::RetryIf;

/// Delay strategy for rate-limited ledger calls:
/// `base * 2^attempt + random(0, 1000ms)`.
pub struct RateLimitBackoff {
    base: Duration,
    attempt: u32,
}

impl RateLimitBackoff {
    pub fn new(base: Duration) -> Self {
        Self { base, attempt: 0 }
    }
}

impl Iterator for RateLimitBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        // Cap the exponent so a long-lived iterator cannot overflow.
        let factor = 1u32 << self.attempt.min(16);
        self.attempt += 1;
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..1000));
        Some(self.base.saturating_mul(factor) + jitter)
    }
}

/// Runs `action`, retrying only on rate-limit errors. Any other error is
/// returned immediately without retrying. Once `max_retries` attempts have
/// all been rejected as rate limited, the distinct
/// [`HistoryError::RetriesExceeded`] is raised instead of the underlying
/// cause.
pub async fn retry_on_rate_limit<T, A, F>(
    action: A,
    max_retries: usize,
    base_delay: Duration,
) -> Result<T, HistoryError>
where
    A: FnMut() -> F,
    F: Future<Output = Result<T, LedgerError>>,
{
    let strategy = RateLimitBackoff::new(base_delay).take(max_retries.saturating_sub(1));
    RetryIf::spawn(strategy, action, |e: &LedgerError| e.is_rate_limited())
        .await
        .map_err(|e| {
            if e.is_rate_limited() {
                tracing::warn!(attempts = max_retries, "retry budget exhausted");
                HistoryError::RetriesExceeded {
                    attempts: max_retries,
                }
            } else {
                HistoryError::Ledger(e)
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn rate_limited() -> LedgerError {
        LedgerError::RateLimited("429 Too Many Requests".into())
    }

    #[tokio::test(start_paused = true)]
    async fn three_rate_limit_failures_exhaust_retries() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32, _> = retry_on_rate_limit(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(rate_limited()) }
            },
            3,
            Duration::from_millis(500),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            result,
            Err(HistoryError::RetriesExceeded { attempts: 3 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn one_rate_limit_then_success_recovers() {
        let calls = AtomicUsize::new(0);
        let result = retry_on_rate_limit(
            || {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        Err(rate_limited())
                    } else {
                        Ok(99u32)
                    }
                }
            },
            3,
            Duration::from_millis(500),
        )
        .await;

        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn non_rate_limit_error_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32, _> = retry_on_rate_limit(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(LedgerError::Transport("connection refused".into())) }
            },
            3,
            Duration::from_millis(500),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result,
            Err(HistoryError::Ledger(LedgerError::Transport(_)))
        ));
    }

    #[test]
    fn backoff_delays_grow_exponentially() {
        let delays: Vec<Duration> = RateLimitBackoff::new(Duration::from_millis(500))
            .take(3)
            .collect();

        for (attempt, delay) in delays.iter().enumerate() {
            let floor = Duration::from_millis(500 * (1 << attempt));
            assert!(*delay >= floor);
            assert!(*delay < floor + Duration::from_millis(1000));
        }
    }
}
