use std::{future::Future, time::Duration};

use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use super::error::SyncError;
use crate::dao::{document_store::CollectionName, storage::StorageResult};

/// Bounded exponential backoff applied to every remote call, each attempt carrying its own
/// deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Deadline of a single attempt; expiry counts as a transient failure.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
            call_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after `current` before the next attempt.
    pub fn next_delay(&self, current: Duration) -> Duration {
        (current * 2).min(self.max_delay)
    }

    /// Run `call` until it succeeds, fails permanently, or attempts are exhausted.
    pub async fn run<T, F, Fut>(
        &self,
        collection: CollectionName,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut delay = self.initial_delay;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let failure = match timeout(self.call_timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(source)) => {
                    let transient = source.is_transient();
                    let failure = SyncError::Storage {
                        collection,
                        operation,
                        attempts: attempt,
                        source,
                    };
                    if !transient {
                        return Err(failure);
                    }
                    failure
                }
                Err(_) => SyncError::Timeout {
                    collection,
                    operation,
                    attempts: attempt,
                },
            };

            if attempt >= max_attempts {
                warn!(%collection, operation, attempt, error = %failure, "giving up on remote call");
                return Err(failure);
            }

            debug!(%collection, operation, attempt, error = %failure, ?delay, "remote call failed; backing off");
            sleep(delay).await;
            delay = self.next_delay(delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    use super::*;
    use crate::{dao::storage::StorageError, sync::SyncFailureKind};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            call_timeout: Duration::from_millis(50),
        }
    }

    fn outage() -> StorageError {
        StorageError::unavailable("offline".into(), std::io::Error::other("offline"))
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let value = fast()
            .run(CollectionName::Teams, "list", move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(outage())
                    } else {
                        Ok(7)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rejections_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let err = fast()
            .run(CollectionName::Fixtures, "put", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(StorageError::rejected("forbidden")) }
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), SyncFailureKind::Rejected);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_calls_time_out_and_count_as_transient() {
        let err = fast()
            .run(CollectionName::Results, "list", || async {
                sleep(Duration::from_secs(5)).await;
                Ok::<_, StorageError>(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Timeout { attempts: 3, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn backoff_is_capped() {
        let policy = fast();
        assert_eq!(policy.next_delay(Duration::from_millis(1)), Duration::from_millis(2));
        assert_eq!(policy.next_delay(Duration::from_millis(3)), Duration::from_millis(4));
    }
}
