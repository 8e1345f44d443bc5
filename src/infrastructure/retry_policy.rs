//! Storage retry policy for SQLite lock contention
//!
//! Only "database is locked"/"busy" failures are retried. Everything else is
//! returned on the first attempt. Delays grow exponentially from the base
//! delay, are capped at the max delay, and carry up to 25% random jitter.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::infrastructure::config::LockRetryConfig;
use crate::infrastructure::database_connection::StorageError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl LockRetryPolicy {
    pub const fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self { max_attempts, base_delay, max_delay }
    }

    pub const fn from_config(config: &LockRetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retrying after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let exponential = self.base_delay.saturating_mul(2_u32.pow(exponent)).min(self.max_delay);

        let jitter_ceiling = u64::try_from(exponential.as_millis() / 4).unwrap_or(u64::MAX);
        let jitter = Duration::from_millis(fastrand::u64(0..=jitter_ceiling));

        (exponential + jitter).min(self.max_delay)
    }

    /// Run `operation`, retrying while it fails on lock contention.
    ///
    /// `operation` must open its own connection and transaction so that a
    /// failed attempt leaves nothing behind.
    pub async fn run<T, F, Fut>(&self, name: &str, mut operation: F) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", name, attempt);
                    }
                    return Ok(value);
                }
                Err(error) if error.is_lock_contention() => {
                    if attempt >= self.max_attempts {
                        warn!("{} gave up after {} locked attempts", name, attempt);
                        return Err(StorageError::LockExhausted {
                            operation: name.to_string(),
                            attempts: attempt,
                            last_error: Box::new(error),
                        });
                    }
                    let delay = self.backoff(attempt);
                    warn!("{} hit a locked database (attempt {}/{}), retrying in {:?}", name, attempt, self.max_attempts, delay);
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

impl Default for LockRetryPolicy {
    fn default() -> Self {
        Self::from_config(&LockRetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_backoff_grows_and_is_capped() {
        let policy = LockRetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(1_000));

        let first = policy.backoff(1);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(125));

        let third = policy.backoff(3);
        assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(500));

        for attempt in 5..40 {
            assert!(policy.backoff(attempt) <= Duration::from_millis(1_000));
        }
    }

    #[tokio::test]
    async fn test_non_lock_errors_are_not_retried() {
        let policy = LockRetryPolicy::new(5, Duration::from_millis(1), Duration::from_millis(2));
        let calls = Cell::new(0);

        let result: Result<(), StorageError> = policy
            .run("lookup", || {
                calls.set(calls.get() + 1);
                async { Err::<(), _>(StorageError::MissingRow { entity: "Products", key: "1".to_string() }) }
            })
            .await;

        assert!(matches!(result, Err(StorageError::MissingRow { .. })));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let policy = LockRetryPolicy::default();
        let value = policy.run("noop", || async { Ok::<_, StorageError>(7) }).await;
        assert_eq!(value.ok(), Some(7));
    }
}
