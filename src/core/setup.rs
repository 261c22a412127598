//! # Panic-safe, deadline-bound setup.
//!
//! The setup function builds the runner list. It runs on its own task so that a
//! panic inside it becomes a [`ServiceError::SetupPanic`] instead of tearing the
//! process down, and it is raced against the setup deadline.
//!
//! ## Flow
//! ```text
//! run_setup(ctx, timeout, handle, setup)
//!   ├─► spawn { catch_unwind(setup(ctx, handle)) } ──► oneshot
//!   └─► select:
//!         ├─ ctx + timeout done → SetupDeadline (task detached, result discarded)
//!         └─ oneshot            → Ok(Setup)  → (runners, returned ctx or `ctx`)
//!                           Err(e)     → Setup { e }
//!                           panic      → SetupPanic { payload }
//! ```
//!
//! ## Rules
//! - The setup function gets `ctx` itself: the deadline bounds the wait for its
//!   result, never the context it may hand back to the runners.
//! - Exactly one of {setup result, deadline error} is observed.
//! - A slow setup task is never aborted; whatever it produces later is dropped.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::oneshot;

use crate::{
    context::Context,
    core::service::ServiceHandle,
    error::{BoxError, ServiceError},
    runners::RunnerRef,
};

/// What a setup function hands back to the service.
///
/// # Example
/// ```rust
/// use runvisor::{Context, DrainBarrier, RunnerRef, Setup};
///
/// let barrier: RunnerRef = std::sync::Arc::new(DrainBarrier::new());
/// let setup = Setup::new([barrier]);
/// assert_eq!(setup.len(), 1);
///
/// // Optional runners: `None` entries are skipped by the service.
/// let maybe_metrics: Option<RunnerRef> = None;
/// let setup = Setup::from_optional([maybe_metrics]).with_context(Context::background());
/// assert!(setup.is_empty());
/// ```
#[derive(Default)]
pub struct Setup {
    runners: Vec<Option<RunnerRef>>,
    ctx: Option<Context>,
}

impl Setup {
    /// Creates a setup result from a list of runners.
    pub fn new(runners: impl IntoIterator<Item = RunnerRef>) -> Self {
        Self {
            runners: runners.into_iter().map(Some).collect(),
            ctx: None,
        }
    }

    /// Creates a setup result from optional runners; `None` entries are skipped.
    pub fn from_optional(runners: impl IntoIterator<Item = Option<RunnerRef>>) -> Self {
        Self {
            runners: runners.into_iter().collect(),
            ctx: None,
        }
    }

    /// Replaces the context the runners (and the wait phase) will use.
    pub fn with_context(mut self, ctx: Context) -> Self {
        self.ctx = Some(ctx);
        self
    }

    /// Number of non-empty runner entries.
    pub fn len(&self) -> usize {
        self.runners.iter().flatten().count()
    }

    /// True when no runner would be started.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn into_parts(self) -> (Vec<RunnerRef>, Option<Context>) {
        (self.runners.into_iter().flatten().collect(), self.ctx)
    }
}

/// Runs `setup` on its own task, converting panics to errors and giving up after `timeout`.
///
/// On success returns the runners and the context to continue with: the one the
/// setup function returned, or `ctx` if it returned none.
pub(crate) async fn run_setup<F, Fut>(
    ctx: Context,
    timeout: Duration,
    handle: ServiceHandle,
    setup: F,
) -> Result<(Vec<RunnerRef>, Context), ServiceError>
where
    F: FnOnce(Context, ServiceHandle) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Setup, BoxError>> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let task_ctx = ctx.clone();
    let bound = ctx.with_timeout(timeout);

    tokio::spawn(async move {
        let span = task_ctx.span().clone();
        let fut = async move { setup(task_ctx, handle).await };

        let outcome = match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(setup)) => Ok(setup),
            Ok(Err(source)) => Err(ServiceError::Setup { source }),
            Err(payload) => {
                let err = panic_to_error(payload);
                tracing::error!(parent: &span, error = %err, "panic during runner setup");
                Err(err)
            }
        };
        let _ = tx.send(outcome);
    });

    tokio::select! {
        source = bound.done() => Err(ServiceError::SetupDeadline { source }),
        outcome = rx => match outcome {
            Ok(Ok(setup)) => {
                let (runners, returned) = setup.into_parts();
                Ok((runners, returned.unwrap_or(ctx)))
            }
            Ok(Err(err)) => Err(err),
            // The task went away without reporting: only possible if the runtime is shutting down.
            Err(_) => Err(ServiceError::SetupPanic {
                message: "setup task terminated without a result".to_string(),
                source: None,
            }),
        },
    }
}

/// Converts a panic payload into [`ServiceError::SetupPanic`].
///
/// An error payload (raised with `std::panic::panic_any(Box<dyn Error>)`) is
/// kept as the source; string payloads are kept as text.
fn panic_to_error(payload: Box<dyn Any + Send>) -> ServiceError {
    match payload.downcast::<BoxError>() {
        Ok(err) => ServiceError::SetupPanic {
            message: err.to_string(),
            source: Some(*err),
        },
        Err(other) => ServiceError::SetupPanic {
            message: panic_message(other.as_ref()),
            source: None,
        },
    }
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else if let Some(err) = payload.downcast_ref::<BoxError>() {
        err.to_string()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{RunnerError, runners::RunnerFn};

    const SETUP_TIMEOUT: Duration = Duration::from_secs(5);

    fn handle() -> ServiceHandle {
        ServiceHandle::new("setup-test")
    }

    #[tokio::test]
    async fn test_setup_result_and_context_propagated() {
        let replaced = Context::background();
        let replaced_token = replaced.token().clone();

        let (runners, ctx) = run_setup(
            Context::background(),
            SETUP_TIMEOUT,
            handle(),
            move |_ctx, _svc| async move {
                let r: RunnerRef =
                    RunnerFn::arc("noop", |_ctx: Context| async { Ok::<_, RunnerError>(()) });
                Ok(Setup::from_optional([Some(r), None]).with_context(replaced))
            },
        )
        .await
        .unwrap();

        assert_eq!(runners.len(), 1);
        ctx.cancel();
        assert!(replaced_token.is_cancelled());
    }

    #[tokio::test]
    async fn test_fallback_context_when_none_returned() {
        let root = Context::background();
        let root_token = root.token().clone();

        let (runners, ctx) = run_setup(root, SETUP_TIMEOUT, handle(), |_ctx, _svc| async {
            Ok(Setup::default())
        })
        .await
        .unwrap();

        assert!(runners.is_empty());
        assert!(ctx.deadline().is_none());
        ctx.cancel();
        assert!(root_token.is_cancelled());
    }

    #[tokio::test]
    async fn test_setup_context_carries_no_deadline() {
        let (_, ctx) = run_setup(
            Context::background(),
            Duration::from_millis(30),
            handle(),
            |ctx: Context, _svc| async move {
                assert!(ctx.deadline().is_none());
                Ok(Setup::default().with_context(ctx))
            },
        )
        .await
        .unwrap();

        // The returned context outlives the setup timeout.
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(ctx.err(), None);
    }

    #[tokio::test]
    async fn test_setup_error_is_wrapped() {
        let err = run_setup(
            Context::background(),
            SETUP_TIMEOUT,
            handle(),
            |_ctx, _svc| async { Err::<Setup, BoxError>("database unreachable".into()) },
        )
        .await
        .err()
        .unwrap();

        assert_eq!(err.as_label(), "service_setup_failed");
        assert!(err.to_string().contains("database unreachable"));
    }

    #[tokio::test]
    async fn test_string_panic_is_converted() {
        let err = run_setup(
            Context::background(),
            SETUP_TIMEOUT,
            handle(),
            |_ctx, _svc| async move {
                if true {
                    panic!("config missing: {}", "PORT");
                }
                Ok(Setup::default())
            },
        )
        .await
        .err()
        .unwrap();

        match err {
            ServiceError::SetupPanic { message, source } => {
                assert_eq!(message, "config missing: PORT");
                assert!(source.is_none());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_panic_payload_is_kept_as_source() {
        let err = run_setup(
            Context::background(),
            SETUP_TIMEOUT,
            handle(),
            |_ctx, _svc| async move {
                if true {
                    let payload: BoxError = "bad certificate".into();
                    std::panic::panic_any(payload);
                }
                Ok(Setup::default())
            },
        )
        .await
        .err()
        .unwrap();

        match err {
            ServiceError::SetupPanic { message, source } => {
                assert_eq!(message, "bad certificate");
                assert!(source.is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_slow_setup_hits_deadline() {
        let err = run_setup(
            Context::background(),
            Duration::from_millis(30),
            handle(),
            |_ctx, _svc| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(Setup::default())
            },
        )
        .await
        .err()
        .unwrap();

        assert!(err.is_deadline_exceeded());
        assert_eq!(
            err.to_string(),
            "unable to initialise runners: runner setup exceeded deadline: context deadline exceeded"
        );
    }
}
