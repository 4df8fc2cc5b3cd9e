use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::Retryable;

/// Explicit retry policy for outbound calls.
///
/// Wraps an async unit of work and retries it on transient failures with
/// exponential backoff plus uniform jitter. Permanent failures and exhausted
/// attempts return the original error unchanged so callers keep the failure
/// kind for their own mapping. The policy knows nothing about the service
/// behind the unit of work.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Policy allowing `max_retries` retries after the initial attempt.
    pub fn with_retries(max_retries: u32) -> Self {
        Self { max_attempts: max_retries.saturating_add(1), ..Self::default() }
    }

    /// Run the unit of work, retrying transient failures until the attempt
    /// budget is spent.
    pub async fn run<T, E, F, Fut>(&self, target: &str, mut operation: F) -> Result<T, E>
    where
        E: Retryable + Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if attempt < max_attempts && error.is_transient() => {
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        target_service = target,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "transient call failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Delay before the retry that follows attempt `attempt` (1-based):
    /// exponential from `base_delay`, jittered by up to one second, capped
    /// at `max_delay`.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let backoff = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay);
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=1_000));
        (backoff + jitter).min(self.max_delay)
    }
}
