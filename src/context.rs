//! # Run context: cancellation, deadline and logger in one value.
//!
//! [`Context`] is what every runner, the setup function and every shutdown hook
//! receive. It bundles:
//! - a [`CancellationToken`] (cooperative cancellation, propagates to children),
//! - an optional deadline ([`tokio::time::Instant`]),
//! - a [`tracing::Span`] acting as the logger (records are emitted with it as
//!   explicit parent, so service fields such as `service=<name>` are attached).
//!
//! ## Derivation
//! ```text
//! root (service span, no deadline)
//!   ├─► child()            → setup context    (no deadline, may be handed to runners)
//!   │     └─► with_timeout(60s) → setup bound (only awaited, never handed out)
//!   └─► with_timeout(15s)  → shutdown context (deadline = min(parent, now+15s))
//! ```
//!
//! ## Rules
//! - Cancelling a context cancels its descendants, never its parent.
//! - A child deadline is never later than its parent's.
//! - [`Context::err`] is `None` until the context is done; afterwards it is stable.

use std::future::Future;
use std::time::Duration;

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::Span;

use crate::error::ContextError;

/// Cancellation + deadline + logger handed to runners and hooks.
///
/// Cheap to clone; clones share cancellation state.
#[derive(Clone, Debug)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
    span: Span,
}

impl Context {
    /// Creates a root context logging into `span`.
    pub fn new(span: Span) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
            span,
        }
    }

    /// Creates a root context with a disabled span.
    pub fn background() -> Self {
        Self::new(Span::none())
    }

    /// Returns the span records for this context should be attached to.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Derives a child that can be cancelled independently of `self`.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            span: self.span.clone(),
        }
    }

    /// Derives a child whose deadline is `timeout` from now (or the parent's, if earlier).
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a child whose deadline is `at` (or the parent's, if earlier).
    pub fn with_deadline(&self, at: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) if parent < at => parent,
            _ => at,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
            span: self.span.clone(),
        }
    }

    /// Returns the deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the underlying cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancels this context and all contexts derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns why the context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            return Some(ContextError::Canceled);
        }
        match self.deadline {
            Some(at) if at <= Instant::now() => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// True once cancelled or past the deadline.
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Completes when the context is cancelled or its deadline elapses.
    pub async fn done(&self) -> ContextError {
        match self.deadline {
            Some(at) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => ContextError::Canceled,
                    _ = time::sleep_until(at) => ContextError::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                ContextError::Canceled
            }
        }
    }

    /// Drives `fut` until it completes or the context is done, whichever comes first.
    ///
    /// `fut` is dropped if the context finishes first.
    pub async fn run_until<F: Future>(&self, fut: F) -> Result<F::Output, ContextError> {
        tokio::select! {
            out = fut => Ok(out),
            err = self.done() => Err(err),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_child_cancel_does_not_touch_parent() {
        let root = Context::background();
        let child = root.child();
        child.cancel();
        assert_eq!(child.err(), Some(ContextError::Canceled));
        assert_eq!(root.err(), None);

        root.cancel();
        assert!(root.child().is_done());
    }

    #[tokio::test]
    async fn test_child_deadline_never_exceeds_parent() {
        let parent = Context::background().with_timeout(Duration::from_millis(50));
        let child = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());

        let tighter = parent.with_timeout(Duration::from_millis(10));
        assert!(tighter.deadline() < parent.deadline());
    }

    #[tokio::test]
    async fn test_done_reports_deadline() {
        let ctx = Context::background().with_timeout(Duration::from_millis(20));
        assert_eq!(ctx.err(), None);
        assert_eq!(ctx.done().await, ContextError::DeadlineExceeded);
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_run_until_bounds_future() {
        let ctx = Context::background().with_timeout(Duration::from_millis(20));
        let res = ctx.run_until(std::future::pending::<()>()).await;
        assert_eq!(res, Err(ContextError::DeadlineExceeded));

        let ctx = Context::background();
        assert_eq!(ctx.run_until(async { 7 }).await, Ok(7));
    }
}
