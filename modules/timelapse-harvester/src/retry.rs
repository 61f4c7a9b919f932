use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reddit_client::Submission;
use timelapse_common::Result;
use tracing::warn;

use crate::traits::FeedSource;

/// Bounded retry for transient collaborator failures.
/// Delay before retry `n` (0-based) is `base_delay * 3^n`, plus up to 1s of
/// jitter when enabled.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retry.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Retries without sleeping. Used by tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            jitter: false,
        }
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        let backoff = self.base_delay * 3u32.saturating_pow(attempt);
        if self.jitter {
            backoff + Duration::from_millis(rand::rng().random_range(0..1000))
        } else {
            backoff
        }
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are exhausted.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, op_name: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt + 1 < policy.max_attempts => {
                let backoff = policy.backoff(attempt);
                warn!(
                    op = op_name,
                    attempt = attempt + 1,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Transient failure, retrying after backoff"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// FeedSource decorator applying a [`RetryPolicy`] to every call.
pub struct RetryingFeed<F> {
    inner: F,
    policy: RetryPolicy,
}

impl<F: FeedSource> RetryingFeed<F> {
    pub fn new(inner: F, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

#[async_trait]
impl<F: FeedSource> FeedSource for RetryingFeed<F> {
    async fn list_new(
        &self,
        feed_id: &str,
        page_size: u32,
        after: Option<&str>,
    ) -> Result<Vec<Submission>> {
        with_retry(&self.policy, "list_new", || {
            self.inner.list_new(feed_id, page_size, after)
        })
        .await
    }

    async fn get_by_ids(&self, reference_ids: &[String]) -> Result<Vec<Submission>> {
        with_retry(&self.policy, "get_by_ids", || self.inner.get_by_ids(reference_ids)).await
    }

    async fn get_by_id(&self, reference_id: &str) -> Result<Submission> {
        with_retry(&self.policy, "get_by_id", || self.inner.get_by_id(reference_id)).await
    }
}
