//! Shared concurrency primitives: a lock+condition monitor and a blocking
//! FIFO built on top of it.
//!
//! Every suspension point in the pipeline goes through [`Monitor::wait_for`]
//! or selects on [`CancellationToken::cancelled`], so cancelling the service's
//! token unblocks every task.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// A piece of state behind one lock, paired with one condition.
///
/// Mutations made through [`Monitor::update`] wake every waiter; waiters
/// re-check their predicate under the lock. The lock is never held across an
/// `.await`.
#[derive(Debug, Default)]
pub struct Monitor<T> {
    state: Mutex<T>,
    changed: Notify,
}

impl<T> Monitor<T> {
    pub fn new(state: T) -> Self {
        Self {
            state: Mutex::new(state),
            changed: Notify::new(),
        }
    }

    /// Lock the state without notifying anyone. For reads.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        // A panic while holding the lock leaves the state consistent: every
        // mutation is a single push/remove/insert.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate the state and wake all waiters.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let result = {
            let mut state = self.lock();
            f(&mut state)
        };
        self.changed.notify_waiters();
        result
    }

    /// Run `f` under the lock until it yields `Some`, suspending between
    /// attempts until the state changes. Returns `None` once `shutdown` fires.
    pub async fn wait_for<R>(
        &self,
        shutdown: &CancellationToken,
        mut f: impl FnMut(&mut T) -> Option<R>,
    ) -> Option<R> {
        loop {
            // Created before the check: notify_waiters() reaches a Notified
            // future from the moment it exists, polled or not.
            let changed = self.changed.notified();

            if shutdown.is_cancelled() {
                return None;
            }
            let attempt = {
                let mut state = self.lock();
                f(&mut state)
            };
            if attempt.is_some() {
                return attempt;
            }

            tokio::select! {
                _ = changed => {}
                _ = shutdown.cancelled() => return None,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// WaitQueue
// ---------------------------------------------------------------------------

/// Unbounded multi-producer multi-consumer FIFO whose `pop` suspends while
/// empty.
#[derive(Debug)]
pub struct WaitQueue<T> {
    items: Monitor<VecDeque<T>>,
}

impl<T> WaitQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Monitor::new(VecDeque::new()),
        }
    }

    pub fn push(&self, item: T) {
        self.items.update(|items| items.push_back(item));
    }

    /// Remove the oldest item, waiting for one if needed. `None` on shutdown.
    pub async fn pop(&self, shutdown: &CancellationToken) -> Option<T> {
        self.items.wait_for(shutdown, |items| items.pop_front()).await
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for WaitQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn wait_for_returns_none_once_cancelled() {
        let monitor = Monitor::new(0u32);
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        // Even a satisfiable predicate is not run after cancellation.
        let seen = monitor.wait_for(&shutdown, |n| Some(*n)).await;
        assert_eq!(seen, None);
    }

    #[tokio::test]
    async fn wait_for_wakes_on_update() {
        let monitor = Arc::new(Monitor::new(0u32));
        let shutdown = CancellationToken::new();

        let waiter = {
            let monitor = Arc::clone(&monitor);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                monitor
                    .wait_for(&shutdown, |n| (*n >= 3).then_some(*n))
                    .await
            })
        };
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            monitor.update(|n| *n += 1);
        }
        let seen = timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert_eq!(seen, Some(3));
    }

    #[tokio::test]
    async fn pop_waits_for_push() {
        let queue = Arc::new(WaitQueue::new());
        let shutdown = CancellationToken::new();

        let popper = {
            let queue = Arc::clone(&queue);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { queue.pop(&shutdown).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!popper.is_finished());

        queue.push(7);
        let popped = timeout(Duration::from_secs(1), popper).await.unwrap().unwrap();
        assert_eq!(popped, Some(7));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn pop_keeps_fifo_order() {
        let queue = WaitQueue::new();
        let shutdown = CancellationToken::new();
        for n in 0..5 {
            queue.push(n);
        }
        for n in 0..5 {
            assert_eq!(queue.pop(&shutdown).await, Some(n));
        }
    }

    #[tokio::test]
    async fn shutdown_unblocks_waiters() {
        let queue: Arc<WaitQueue<u32>> = Arc::new(WaitQueue::new());
        let shutdown = CancellationToken::new();

        let poppers: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let shutdown = shutdown.clone();
                tokio::spawn(async move { queue.pop(&shutdown).await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.cancel();

        for popper in poppers {
            let popped = timeout(Duration::from_secs(1), popper).await.unwrap().unwrap();
            assert_eq!(popped, None);
        }
    }
}
