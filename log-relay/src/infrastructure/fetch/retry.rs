use async_trait::async_trait;
use std::time::Duration;

use crate::application::ports::{FetchResult, LogFetcher, LogSource};
use crate::domain::SubscriptionKey;

/// Attempt budget and exponential backoff for one tick's fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt number `attempt` (1-based): `2^attempt * base`
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Retries a [`LogSource`] until it succeeds or the attempt budget runs out,
/// then returns the last classified error
pub struct RetryingFetcher<S> {
    source: S,
    policy: RetryPolicy,
}

impl<S: LogSource> RetryingFetcher<S> {
    pub fn new(source: S, policy: RetryPolicy) -> Self {
        RetryingFetcher { source, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<S: LogSource> LogFetcher for RetryingFetcher<S> {
    async fn fetch(&self, key: &SubscriptionKey) -> FetchResult {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.source.fetch_once(key).await {
                Ok(log) => {
                    if attempt > 1 {
                        tracing::debug!(key = %key, attempt, "Fetch recovered after retry");
                    }
                    return Ok(log);
                }
                Err(error) if attempt >= max_attempts => {
                    tracing::warn!(
                        key = %key,
                        attempts = attempt,
                        error = %error,
                        "Fetch failed, retries exhausted"
                    );
                    return Err(error);
                }
                Err(error) => {
                    let delay = self.policy.backoff(attempt);
                    tracing::debug!(
                        key = %key,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Fetch attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
