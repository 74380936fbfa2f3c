//! Fail-fast fan-out of independent operations.

use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use tokio::task::{JoinError, JoinHandle};

/// A group of concurrently running operations that reports the first failure.
///
/// Every operation is spawned as its own task as soon as it is added, with
/// no bound on parallelism. [`wait`](Self::wait) returns as soon as one
/// operation fails. Operations still in flight at that point are detached,
/// not cancelled: they run to completion in the background and their
/// outcomes are discarded.
pub struct FailFastGroup<E> {
    pending: FuturesUnordered<JoinHandle<Result<(), E>>>,
}

impl<E> FailFastGroup<E>
where
    E: From<JoinError> + Send + 'static,
{
    /// Creates an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: FuturesUnordered::new(),
        }
    }

    /// Launches an operation.
    pub fn spawn<F>(&mut self, operation: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
    {
        self.pending.push(tokio::spawn(operation));
    }

    /// Number of operations not yet settled.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if no operations are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Waits until every operation succeeded or the first one failed.
    ///
    /// Returns the number of operations that completed. A panicked operation
    /// counts as a failure.
    pub async fn wait(mut self) -> Result<usize, E> {
        let mut completed = 0;
        while let Some(joined) = self.pending.next().await {
            match joined {
                Ok(Ok(())) => completed += 1,
                Ok(Err(e)) => return Err(e),
                Err(join_error) => return Err(E::from(join_error)),
            }
        }
        Ok(completed)
    }
}

impl<E> Default for FailFastGroup<E>
where
    E: From<JoinError> + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for FailFastGroup<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailFastGroup")
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;
    use tokio_test::{assert_err, assert_ok};

    #[derive(Debug, PartialEq)]
    enum TestError {
        Failed(&'static str),
        Aborted,
    }

    impl From<JoinError> for TestError {
        fn from(_: JoinError) -> Self {
            Self::Aborted
        }
    }

    #[tokio::test]
    async fn test_all_succeed() {
        let mut group: FailFastGroup<TestError> = FailFastGroup::new();
        for _ in 0..3 {
            group.spawn(async { Ok(()) });
        }
        assert_eq!(group.len(), 3);
        assert_eq!(assert_ok!(group.wait().await), 3);
    }

    #[tokio::test]
    async fn test_empty_group() {
        let group: FailFastGroup<TestError> = FailFastGroup::default();
        assert!(group.is_empty());
        assert_eq!(group.wait().await, Ok(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_error_returns_before_slow_siblings() {
        let finished = Arc::new(AtomicUsize::new(0));
        let mut group = FailFastGroup::new();

        let slow = Arc::clone(&finished);
        group.spawn(async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            slow.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        group.spawn(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err(TestError::Failed("boom"))
        });

        let started = Instant::now();
        assert_eq!(group.wait().await, Err(TestError::Failed("boom")));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        // the sibling was detached, not cancelled
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_first_error_is_reported() {
        let mut group = FailFastGroup::new();
        group.spawn(async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Err(TestError::Failed("second"))
        });
        group.spawn(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err(TestError::Failed("first"))
        });
        assert_eq!(group.wait().await, Err(TestError::Failed("first")));
    }

    #[tokio::test]
    async fn test_panic_counts_as_failure() {
        let mut group: FailFastGroup<TestError> = FailFastGroup::new();
        let explode = true;
        group.spawn(async move {
            if explode {
                panic!("operation panicked");
            }
            Ok(())
        });
        assert_eq!(assert_err!(group.wait().await), TestError::Aborted);
    }
}
