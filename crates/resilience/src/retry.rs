//! Bounded retry with exponential back-off.

use std::fmt::Debug;
use std::time::Duration;
use tokio::time::sleep;

/// Retry policy: `retries + 1` attempts in total, waiting `base_delay`,
/// then twice that, and so on (capped at `max_delay`) between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}
impl Backoff {
    pub fn new(retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            retries,
            base_delay,
            max_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.checked_mul(factor).unwrap_or(self.max_delay).min(self.max_delay)
    }

    /// Invoke `operation` until it succeeds or the attempts run out.
    ///
    /// Every error counts as retryable. Once the last attempt fails its error
    /// is returned as-is.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Debug,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= max_attempts => {
                    if max_attempts > 1 {
                        tracing::warn!(attempts = attempt, error = ?err, "Giving up after exhausting retries");
                    }
                    return Err(err);
                },
                Err(err) => {
                    let delay = self.delay_after(attempt);
                    tracing::debug!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = ?err,
                        "Operation failed; backing off before retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                },
            }
        }
    }
}
