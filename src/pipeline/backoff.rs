//! Backoff policies and waiting
//!
//! Delays grow linearly with the attempt number and are capped. Waiting goes
//! through [`Sleeper`] so tests can substitute a fake clock.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Linear capped backoff with an attempt ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay after the first attempt
    pub base: Duration,
    /// Upper bound for any single delay
    pub cap: Duration,
    /// Attempts allowed before giving up
    pub max_attempts: u32,
}

impl BackoffPolicy {
    /// Create a policy
    pub const fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            cap,
            max_attempts,
        }
    }

    /// Delay after the given 1-based attempt: `base * attempt`, capped
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(attempt.max(1)).min(self.cap)
    }

    /// Whether `attempt` has used up the budget
    pub const fn exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}

/// Something that can wait
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Wait for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Real-time sleeper backed by tokio's timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Run a remote call with a time limit; expiry is a transient [`Error::Timeout`]
pub async fn with_timeout<T, Fut>(limit: Duration, call: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| Error::Timeout(limit))?
}

/// Retry an operation while it fails with a transient error
///
/// Non-transient errors are returned immediately; the last transient error is
/// returned once the policy is exhausted.
pub async fn retry_transient<T, F, Fut>(
    policy: &BackoffPolicy,
    sleeper: &dyn Sleeper,
    what: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && !policy.exhausted(attempt) => {
                let delay = policy.delay(attempt);
                debug!("{what} failed (attempt {attempt}): {e}; retrying in {delay:?}");
                sleeper.sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
