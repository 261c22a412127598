//! # Runner contract.
//!
//! A [`Runner`] is a long-running component (listener, consumer, background
//! loop) whose lifetime the [`Service`](crate::Service) manages:
//! - `start` runs on its own task and blocks for as long as the component is healthy;
//! - `stop` is called from the shutdown coordinator, on another task, possibly
//!   while `start` is still in flight.
//!
//! Implementations must therefore keep the "stop the active `start`" logic thread-safe.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{context::Context, error::RunnerError};

/// Shared handle to a runner.
pub type RunnerRef = Arc<dyn Runner>;

/// # Long-running, stoppable component.
///
/// ## Contract
/// - [`start`](Runner::start) must not return while the component is healthy.
///   Returning (with or without error) triggers shutdown of every other runner.
/// - [`stop`](Runner::stop) unblocks `start`. It must honor the deadline of the
///   supplied context and return [`RunnerError::DeadlineExceeded`] if it could not
///   finish in time. Calling it without a prior `start` must neither panic nor deadlock.
/// - [`name`](Runner::name) is used for diagnostics only; it need not be unique.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tokio::sync::Notify;
/// use runvisor::{Context, Runner, RunnerError};
///
/// struct Idle {
///     stop: Notify,
/// }
///
/// #[async_trait]
/// impl Runner for Idle {
///     fn name(&self) -> &str { "idle" }
///
///     async fn start(&self, _ctx: Context) -> Result<(), RunnerError> {
///         self.stop.notified().await;
///         Ok(())
///     }
///
///     async fn stop(&self, _ctx: Context) -> Result<(), RunnerError> {
///         self.stop.notify_one();
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Runner: Send + Sync + 'static {
    /// Returns a stable, human-readable runner name.
    fn name(&self) -> &str;

    /// Runs the component until it stops, fails, or is asked to stop.
    async fn start(&self, ctx: Context) -> Result<(), RunnerError>;

    /// Requests the component to stop, within the deadline carried by `ctx`.
    async fn stop(&self, ctx: Context) -> Result<(), RunnerError>;

    /// Whether the service must wait for `start` to return before exiting.
    ///
    /// The wait happens after every runner was asked to stop and is not bounded
    /// by the shutdown timeout. Defaults to `false`.
    fn holds_exit(&self) -> bool {
        false
    }
}
