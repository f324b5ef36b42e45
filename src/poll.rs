//! Retry-until-true assertions over freshly read state
//!
//! A [`Poll`] re-runs its reader on every iteration; values are never carried
//! from one iteration to the next except as the diagnostic reported on
//! timeout. Dropping the returned future cancels the poll, which is how an
//! enclosing scenario timeout stops it.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::config::Timeouts;
use crate::error::{HarnessError, HarnessResult, SessionError};

/// Fixed-interval polling bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poll {
    timeout: Duration,
    interval: Duration,
}

impl Poll {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Bound used for post-action transitions
    pub fn transition(timeouts: &Timeouts) -> Self {
        Self::new(timeouts.transition(), timeouts.poll_interval())
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Read until `predicate` holds, returning the value that satisfied it.
    ///
    /// Read failures count as an observation and polling continues, except
    /// for backend failures which mean the session itself is gone.
    pub async fn until<T, F, Fut, P>(
        &self,
        what: &str,
        mut read: F,
        mut predicate: P,
    ) -> HarnessResult<T>
    where
        T: fmt::Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = HarnessResult<T>>,
        P: FnMut(&T) -> bool,
    {
        let start = Instant::now();
        let mut last_observed;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match read().await {
                Ok(value) if predicate(&value) => {
                    trace!(what, attempts, "poll satisfied");
                    return Ok(value);
                }
                Ok(value) => last_observed = format!("{value:?}"),
                Err(HarnessError::Session(err @ SessionError::Backend(_))) => {
                    return Err(HarnessError::Session(err));
                }
                Err(err) => last_observed = format!("read failed: {err}"),
            }

            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                return Err(HarnessError::AssertionTimeout {
                    what: what.to_string(),
                    last_observed,
                    elapsed,
                });
            }
            tokio::time::sleep(self.interval.min(self.timeout - elapsed)).await;
        }
    }

    /// Read until the value equals `expected`
    pub async fn until_eq<T, F, Fut>(&self, what: &str, read: F, expected: T) -> HarnessResult<T>
    where
        T: fmt::Debug + PartialEq,
        F: FnMut() -> Fut,
        Fut: Future<Output = HarnessResult<T>>,
    {
        self.until(what, read, |value| *value == expected).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn poll() -> Poll {
        Poll::new(Duration::from_secs(5), Duration::from_millis(100))
    }

    #[tokio::test(start_paused = true)]
    async fn returns_once_predicate_holds() {
        let reads = Arc::new(AtomicUsize::new(0));
        let counter = reads.clone();

        let value = poll()
            .until_eq(
                "badge to reach 3",
                || {
                    let counter = counter.clone();
                    async move { Ok::<_, HarnessError>(counter.fetch_add(1, Ordering::SeqCst) + 1) }
                },
                3,
            )
            .await
            .expect("badge should reach 3");

        assert_eq!(value, 3);
        assert_eq!(reads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_with_last_observed_value() {
        let start = Instant::now();
        let result = poll()
            .until_eq("badge to show 2", || async { Ok::<_, HarnessError>(1usize) }, 2)
            .await;

        match result {
            Err(HarnessError::AssertionTimeout {
                what,
                last_observed,
                elapsed,
            }) => {
                assert_eq!(what, "badge to show 2");
                assert_eq!(last_observed, "1");
                assert!(elapsed >= Duration::from_secs(5));
            }
            other => panic!("Expected AssertionTimeout, got {other:?}"),
        }
        assert!(start.elapsed() < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn read_errors_are_reported_not_fatal() {
        let reads = Arc::new(AtomicUsize::new(0));
        let counter = reads.clone();

        let value = poll()
            .until(
                "element to appear",
                || {
                    let counter = counter.clone();
                    async move {
                        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                            Err(HarnessError::InvalidPrice("".to_string()))
                        } else {
                            Ok::<_, HarnessError>(true)
                        }
                    }
                },
                |ready| *ready,
            )
            .await
            .unwrap();

        assert!(value);
        assert_eq!(reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn backend_failure_aborts_immediately() {
        let result: HarnessResult<bool> = poll()
            .until(
                "anything",
                || async {
                    Err::<bool, _>(HarnessError::from(SessionError::Backend(
                        "browser closed".to_string(),
                    )))
                },
                |_| true,
            )
            .await;

        assert!(matches!(
            result,
            Err(HarnessError::Session(SessionError::Backend(_)))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn enclosing_timeout_cancels_the_poll() {
        let long = Poll::new(Duration::from_secs(60), Duration::from_millis(100));
        let outer = tokio::time::timeout(
            Duration::from_secs(1),
            long.until_eq("never", || async { Ok::<_, HarnessError>(0u8) }, 1),
        )
        .await;
        assert!(outer.is_err(), "outer timeout should fire first");
    }
}
