//! Aggregate readiness for one generation.
//!
//! # Design
//! - Backed by a `tokio::sync::watch` channel created per generation; a reload
//!   builds a new channel, so readiness naturally resets to `Starting`.
//! - Transitions are monotonic: only `Starting` may move, and only once.

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{CoreError, CoreResult};

/// Readiness of the current generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Startup tasks are still in flight.
    Starting,
    /// Every startup task resolved.
    Ready,
    /// A startup task rejected; the generation will never become ready.
    Failed(Arc<str>),
}

/// Create a publisher/handle pair in the `Starting` state.
#[must_use]
pub fn readiness_channel() -> (ReadinessPublisher, ReadinessHandle) {
    let (tx, rx) = watch::channel(Readiness::Starting);
    (ReadinessPublisher { tx }, ReadinessHandle { rx })
}

/// Write side, owned by the orchestrator's driver task.
#[derive(Debug)]
pub struct ReadinessPublisher {
    tx: watch::Sender<Readiness>,
}

impl ReadinessPublisher {
    /// Move `Starting` to `Ready`. Returns whether the state changed.
    pub fn mark_ready(&self) -> bool {
        self.settle(Readiness::Ready)
    }

    /// Move `Starting` to `Failed`. Returns whether the state changed.
    pub fn mark_failed(&self, reason: impl Into<Arc<str>>) -> bool {
        self.settle(Readiness::Failed(reason.into()))
    }

    fn settle(&self, next: Readiness) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == Readiness::Starting {
                *current = next;
                true
            } else {
                false
            }
        })
    }
}

/// Read side shared by the health reporter and the reload controller.
#[derive(Debug, Clone)]
pub struct ReadinessHandle {
    rx: watch::Receiver<Readiness>,
}

impl ReadinessHandle {
    /// Snapshot of the current state.
    #[must_use]
    pub fn current(&self) -> Readiness {
        self.rx.borrow().clone()
    }

    /// Whether every startup task has resolved.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(*self.rx.borrow(), Readiness::Ready)
    }

    /// Wait until the generation settles.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StartupFailed`] when a task rejected and
    /// [`CoreError::StartupAbandoned`] when the publisher was dropped first.
    pub async fn wait(&self) -> CoreResult<()> {
        let mut rx = self.rx.clone();
        let settled = rx
            .wait_for(|state| *state != Readiness::Starting)
            .await
            .map_err(|_| CoreError::StartupAbandoned)?;
        match &*settled {
            Readiness::Failed(reason) => Err(CoreError::StartupFailed {
                reason: reason.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ready_is_monotonic() {
        let (publisher, handle) = readiness_channel();
        assert_eq!(handle.current(), Readiness::Starting);
        assert!(!handle.is_ready());

        assert!(publisher.mark_ready());
        assert!(handle.is_ready());
        assert!(!publisher.mark_failed("late failure"));
        assert!(!publisher.mark_ready());
        assert!(handle.is_ready());
        handle.wait().await.expect("ready");
    }

    #[tokio::test]
    async fn failure_is_sticky_and_reported() {
        let (publisher, handle) = readiness_channel();
        assert!(publisher.mark_failed("archive:world failed"));
        assert!(!publisher.mark_ready());
        let err = handle.wait().await.expect_err("failed");
        assert!(
            matches!(err, CoreError::StartupFailed { ref reason } if reason == "archive:world failed")
        );
    }

    #[tokio::test]
    async fn dropped_publisher_abandons_waiters() {
        let (publisher, handle) = readiness_channel();
        let waiter = tokio::spawn({
            let handle = handle.clone();
            async move { handle.wait().await }
        });
        drop(publisher);
        let outcome = waiter.await.expect("join");
        assert!(matches!(outcome, Err(CoreError::StartupAbandoned)));
    }

    #[tokio::test]
    async fn waiters_wake_on_ready() {
        let (publisher, handle) = readiness_channel();
        let waiter = tokio::spawn({
            let handle = handle.clone();
            async move { handle.wait().await }
        });
        tokio::task::yield_now().await;
        publisher.mark_ready();
        waiter.await.expect("join").expect("ready");
    }
}
