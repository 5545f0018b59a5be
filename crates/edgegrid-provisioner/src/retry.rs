//! Optimistic-concurrency retry with backoff and jitter.
//!
//! Only write conflicts are retried; every other error aborts the loop and
//! is returned as-is.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::error::{ProvisionError, ProvisionResult};

/// Backoff policy for conflict retries.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    /// Fraction of the delay added or removed at random.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(10),
            backoff_multiplier: 1.0,
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 {
            return delay;
        }
        let factor = rand::thread_rng().gen_range((1.0 - self.jitter)..(1.0 + self.jitter));
        Duration::from_secs_f64(delay.as_secs_f64() * factor)
    }
}

/// Run `operation` until it succeeds, fails with something other than a
/// conflict, or `policy.max_attempts` conflicts have been seen.
///
/// Each attempt must re-read whatever it writes; the loop only decides
/// whether to go again.
pub async fn retry_on_conflict<F, Fut, T>(
    policy: &RetryPolicy,
    name: &str,
    cancel: &CancellationToken,
    mut operation: F,
) -> ProvisionResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProvisionResult<T>>,
{
    let mut attempt = 0u32;
    let mut delay = policy.initial_delay;

    loop {
        attempt += 1;

        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_conflict() => e,
            Err(e) => return Err(e),
        };

        if attempt >= policy.max_attempts {
            error!(%name, attempt, error = %err, "conflict retries exhausted");
            let ProvisionError::Platform(last) = err else {
                return Err(err);
            };
            return Err(ProvisionError::ConflictRetriesExhausted {
                name: name.to_string(),
                attempts: attempt,
                last,
            });
        }

        let wait = policy.jittered(delay);
        warn!(%name, attempt, error = %err, delay_ms = wait.as_millis(), "write conflict, retrying");

        tokio::select! {
            _ = cancel.cancelled() => return Err(ProvisionError::Cancelled),
            _ = tokio::time::sleep(wait) => {}
        }

        delay = Duration::from_secs_f64(delay.as_secs_f64() * policy.backoff_multiplier);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlatformError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn conflict() -> ProvisionError {
        PlatformError::Conflict {
            kind: "deployment",
            name: "k3s-a".to_string(),
            message: "object has been modified".to_string(),
        }
        .into()
    }

    fn fast() -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(1),
            ..Default::default()
        }
    }

    #[test]
    fn default_policy_is_fixed() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_delay, Duration::from_millis(10));
        assert_eq!(policy.backoff_multiplier, 1.0);
        assert_eq!(policy.jitter, 0.1);
    }

    #[tokio::test]
    async fn conflicts_are_retried_until_success() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let result = retry_on_conflict(&fast(), "update", &CancellationToken::new(), || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(conflict())
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_errors_abort_immediately() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let result: ProvisionResult<()> = retry_on_conflict(&fast(), "update", &CancellationToken::new(), || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(PlatformError::Api {
                    code: 403,
                    reason: "Forbidden".to_string(),
                    message: "no".to_string(),
                }
                .into())
            }
        })
        .await;

        assert!(matches!(
            result,
            Err(ProvisionError::Platform(PlatformError::Api { code: 403, .. }))
        ));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_conflicts_report_attempts() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let result: ProvisionResult<()> = retry_on_conflict(&fast(), "update", &CancellationToken::new(), || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(conflict())
            }
        })
        .await;

        match result {
            Err(ProvisionError::ConflictRetriesExhausted { attempts, last, .. }) => {
                assert_eq!(attempts, 5);
                assert!(last.is_conflict());
            }
            other => panic!("expected exhausted retries, got {other:?}"),
        }
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn cancellation_interrupts_backoff() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_secs(60),
            jitter: 0.0,
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: ProvisionResult<()> =
            retry_on_conflict(&policy, "update", &cancel, || async { Err(conflict()) }).await;
        assert!(matches!(result, Err(ProvisionError::Cancelled)));
    }
}
