//! # Drain barrier: hold process exit until background work completes.
//!
//! [`DrainBarrier`] is a [`Runner`] that tracks fire-and-forget work submitted
//! through [`DrainBarrier::submit`]. It drains in two phases:
//!
//! ```text
//! running:   submit() ──► outstanding += 1 ──► spawn(work) ──► outstanding -= 1
//!            start()  ──► waits for the gate
//!
//! shutdown:  stop()   ──► gate closed (once, idempotent)
//!            start()  ──► waits until outstanding == 0 ──► returns
//! ```
//!
//! ## Rules
//! - The counter is decremented when the work finishes, panics included.
//! - `stop` only closes the gate; it never waits for the drain, so it always
//!   meets the shutdown deadline.
//! - The drain itself is unbounded: `start` returns once every submitted unit is done.
//! - Submissions after the gate closed are still tracked until the counter reaches zero.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::{context::Context, error::RunnerError, runners::runner::Runner};

struct Inner {
    outstanding: AtomicUsize,
    gate: CancellationToken,
    drained: Notify,
}

/// Decrements the outstanding counter on drop.
struct Pending(Arc<Inner>);

impl Drop for Pending {
    fn drop(&mut self) {
        if self.0.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.drained.notify_waiters();
        }
    }
}

/// Runner that waits for submitted asynchronous work before letting the service exit.
///
/// Clones share state: hand one clone to business logic and register another
/// with the service.
///
/// # Example
/// ```rust
/// use runvisor::{Context, DrainBarrier, Runner};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let barrier = DrainBarrier::new();
/// barrier.submit(async {
///     // send an audit record, flush a cache entry...
/// });
///
/// barrier.stop(Context::background()).await.unwrap();
/// barrier.start(Context::background()).await.unwrap(); // returns once the work is done
/// assert_eq!(barrier.outstanding(), 0);
/// # }
/// ```
#[derive(Clone)]
pub struct DrainBarrier {
    inner: Arc<Inner>,
}

impl DrainBarrier {
    /// Creates a barrier with an open gate and no outstanding work.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                outstanding: AtomicUsize::new(0),
                gate: CancellationToken::new(),
                drained: Notify::new(),
            }),
        }
    }

    /// Runs `work` on its own task and tracks it until completion.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner.outstanding.fetch_add(1, Ordering::AcqRel);
        let pending = Pending(Arc::clone(&self.inner));

        tokio::spawn(async move {
            let _pending = pending;
            work.await;
        });
    }

    /// Number of submitted units that have not finished yet.
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    /// True once [`Runner::stop`] was called.
    pub fn is_closed(&self) -> bool {
        self.inner.gate.is_cancelled()
    }

    async fn drained(&self) {
        loop {
            let notified = self.inner.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Default for DrainBarrier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Runner for DrainBarrier {
    fn name(&self) -> &str {
        "wait for asynchronous operations to complete"
    }

    async fn start(&self, ctx: Context) -> Result<(), RunnerError> {
        self.inner.gate.cancelled().await;

        tracing::debug!(
            parent: ctx.span(),
            outstanding = self.outstanding(),
            "draining asynchronous operations"
        );
        self.drained().await;
        Ok(())
    }

    async fn stop(&self, _ctx: Context) -> Result<(), RunnerError> {
        self.inner.gate.cancel();
        Ok(())
    }

    fn holds_exit(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_start_blocks_until_gate_closed() {
        let barrier = DrainBarrier::new();
        let b = barrier.clone();
        let start = tokio::spawn(async move { b.start(Context::background()).await });

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!start.is_finished(), "start must wait for stop even with no work");

        barrier.stop(Context::background()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), start)
            .await
            .expect("start should return once the gate is closed")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_drain_waits_for_all_units_beyond_stop_deadline() {
        let barrier = DrainBarrier::new();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let done = done.clone();
            barrier.submit(async move {
                tokio::time::sleep(Duration::from_millis(150)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(barrier.outstanding(), 5);

        let b = barrier.clone();
        let start = tokio::spawn(async move { b.start(Context::background()).await });

        let began = Instant::now();
        let stop_ctx = Context::background().with_timeout(Duration::from_millis(10));
        barrier.stop(stop_ctx).await.unwrap();
        assert!(began.elapsed() < Duration::from_millis(100));

        start.await.unwrap().unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 5);
        assert_eq!(barrier.outstanding(), 0);
        assert!(began.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_double_stop_is_harmless() {
        let barrier = DrainBarrier::new();
        barrier.submit(async {});

        barrier.stop(Context::background()).await.unwrap();
        barrier.stop(Context::background()).await.unwrap();
        assert!(barrier.is_closed());

        tokio::time::timeout(Duration::from_secs(1), barrier.start(Context::background()))
            .await
            .expect("start should not hang after a double stop")
            .unwrap();
        assert_eq!(barrier.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_panicking_work_is_still_counted_down() {
        let barrier = DrainBarrier::new();
        barrier.submit(async {
            panic!("work exploded");
        });
        barrier.stop(Context::background()).await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), barrier.start(Context::background()))
            .await
            .expect("a panicking unit must not block the drain")
            .unwrap();
    }
}
