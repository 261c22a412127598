//! # Function-backed runner (`RunnerFn`)
//!
//! [`RunnerFn`] wraps a closure `F: Fn(Context) -> Fut`. `start` calls the closure
//! with a child context; `stop` cancels that context and returns immediately, so
//! the closure is expected to watch [`Context::done`] and return.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use runvisor::{Context, Runner, RunnerError, RunnerFn, RunnerRef};
//!
//! let ticker: RunnerRef = RunnerFn::arc("ticker", |ctx: Context| async move {
//!     loop {
//!         tokio::select! {
//!             _ = ctx.done() => return Ok::<_, RunnerError>(()),
//!             _ = tokio::time::sleep(Duration::from_secs(1)) => tracing::info!("tick"),
//!         }
//!     }
//! });
//! assert_eq!(ticker.name(), "ticker");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{context::Context, error::RunnerError, runners::runner::Runner};

/// Closure-backed runner.
#[derive(Debug)]
pub struct RunnerFn<F> {
    name: Cow<'static, str>,
    f: F,
    stopped: CancellationToken,
}

impl<F> RunnerFn<F> {
    /// Creates a new function-backed runner.
    ///
    /// Prefer [`RunnerFn::arc`] when you immediately need a [`RunnerRef`](crate::RunnerRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            stopped: CancellationToken::new(),
        }
    }

    /// Creates the runner and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Runner for RunnerFn<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), RunnerError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, ctx: Context) -> Result<(), RunnerError> {
        let run = ctx.child();
        let fut = (self.f)(run.clone());
        tokio::pin!(fut);

        tokio::select! {
            res = &mut fut => res,
            _ = self.stopped.cancelled() => {
                run.cancel();
                fut.await
            }
        }
    }

    async fn stop(&self, _ctx: Context) -> Result<(), RunnerError> {
        self.stopped.cancel();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_stop_cancels_running_closure() {
        let runner = RunnerFn::arc("loop", |ctx: Context| async move {
            ctx.done().await;
            Ok::<_, RunnerError>(())
        });

        let r = runner.clone();
        let start = tokio::spawn(async move { r.start(Context::background()).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        runner.stop(Context::background()).await.unwrap();

        let res = tokio::time::timeout(Duration::from_secs(1), start)
            .await
            .expect("start should return after stop")
            .unwrap();
        assert!(res.is_ok());
    }

    #[tokio::test]
    async fn test_stop_before_start_is_harmless() {
        let runner = RunnerFn::new("never-started", |ctx: Context| async move {
            ctx.done().await;
            Ok::<_, RunnerError>(())
        });
        runner.stop(Context::background()).await.unwrap();
        runner.stop(Context::background()).await.unwrap();

        // A later start observes the stop immediately.
        let res = tokio::time::timeout(Duration::from_secs(1), runner.start(Context::background()))
            .await
            .expect("start after stop should return");
        assert!(res.is_ok());
    }

    #[tokio::test]
    async fn test_closure_error_is_returned() {
        let runner = RunnerFn::new("fails", |_ctx: Context| async move {
            Err(RunnerError::fail("boom"))
        });
        let err = runner.start(Context::background()).await.unwrap_err();
        assert_eq!(err.as_label(), "runner_failed");
    }
}
