use super::FetchError;
use chrono::{DateTime, Utc};
use core::time::Duration;
use ohno::app_err;

const LOG_TARGET: &str = "     retry";

/// Bounded retry with exponential backoff and rate-limit awareness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_rate_limit_wait: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_rate_limit_wait: Duration::from_secs(3600),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn is_retryable(err: &FetchError) -> bool {
        matches!(err, FetchError::Network(_) | FetchError::RateLimited { .. })
    }

    /// How long to wait after failed attempt number `attempt` (1-based).
    ///
    /// Rate limits wait until the reset time, capped by `max_rate_limit_wait`. Everything
    /// else backs off exponentially from `base_delay`, capped by `max_delay`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, err: &FetchError, now: DateTime<Utc>) -> Duration {
        if let FetchError::RateLimited { reset_at: Some(reset_at) } = err {
            let until_reset = reset_at.signed_duration_since(now).to_std().unwrap_or(Duration::ZERO);
            return until_reset.min(self.max_rate_limit_wait);
        }

        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Bound a single attempt by `attempt_timeout`. A timeout is a network error.
    pub async fn timed<T>(&self, attempt: impl Future<Output = Result<T, FetchError>>) -> Result<T, FetchError> {
        match tokio::time::timeout(self.attempt_timeout, attempt).await {
            Ok(result) => result,
            Err(_elapsed) => Err(FetchError::network(app_err!(
                "request timed out after {}s",
                self.attempt_timeout.as_secs()
            ))),
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or attempts run out.
    ///
    /// `on_retry` is told about every failure that will be retried, together with the
    /// delay about to be slept, before the sleep starts.
    pub async fn execute<T, Op, Fut, R>(&self, label: &str, mut op: Op, mut on_retry: R) -> Result<T, FetchError>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
        R: FnMut(&FetchError, Duration),
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !Self::is_retryable(&e) || attempt >= self.max_attempts => {
                    log::debug!(target: LOG_TARGET, "Giving up on {label} after {attempt} attempt(s): {e}");
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.delay_for(attempt, &e, Utc::now());
                    log::debug!(
                        target: LOG_TARGET,
                        "Retrying {label} in {}ms (attempt {attempt} failed: {e})",
                        delay.as_millis()
                    );
                    on_retry(&e, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
