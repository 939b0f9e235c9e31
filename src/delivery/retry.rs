use std::time::Duration;

use crate::channels::ChannelBackend;
use crate::config::DispatchConfig;
use crate::notification::{DeliveryOutcome, NotificationRequest};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Always at least 1.
    max_attempts: u32,
    backoff: Duration,
    retry_permanent: bool,
}

impl RetryPolicy {
    /// Unconditional retry without backoff. `max_attempts` below 1 is raised to 1.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Duration::ZERO,
            retry_permanent: true,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// When `false`, failures the backend marks as permanent end the loop early.
    pub fn retry_permanent(mut self, retry: bool) -> Self {
        self.retry_permanent = retry;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2)
    }
}

impl From<&DispatchConfig> for RetryPolicy {
    fn from(config: &DispatchConfig) -> Self {
        Self::new(config.max_attempts)
            .with_backoff(config.backoff())
            .retry_permanent(config.retry_permanent)
    }
}

/// Re-invokes the wrapped backend until it succeeds or the attempt budget is spent.
pub struct RetryChannel {
    inner: Box<dyn ChannelBackend>,
    policy: RetryPolicy,
}

impl RetryChannel {
    pub fn new(inner: Box<dyn ChannelBackend>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait::async_trait]
impl ChannelBackend for RetryChannel {
    async fn transmit(&self, request: &NotificationRequest) -> DeliveryOutcome {
        let mut attempt = 1;
        loop {
            let outcome = self.inner.transmit(request).await;
            let DeliveryOutcome::Failed(err) = &outcome else {
                return outcome;
            };
            if attempt >= self.policy.max_attempts {
                return outcome;
            }
            if err.is_permanent() && !self.policy.retry_permanent {
                tracing::debug!("Not retrying permanent failure: {err}");
                return outcome;
            }
            tracing::debug!(
                "Retrying after attempt {attempt}/{}: {err}",
                self.policy.max_attempts
            );
            if !self.policy.backoff.is_zero() {
                tokio::time::sleep(self.policy.backoff).await;
            }
            attempt += 1;
        }
    }
}
