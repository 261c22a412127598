//! # Wait phase: decide why the run ends.
//!
//! A single selection among three events, whichever fires first:
//!
//! ```text
//! ┌ runner exit (first one only) ─► its result (Ok = clean exit, still stops everything)
//! ├ shutdown signal              ─► record signal time, Ok(())
//! └ ctx done                     ─► pending runner exit if any, else ContextError
//! ```
//!
//! Exactly one outcome is returned and nothing is awaited afterwards.

use std::future::Future;

use crate::{
    context::Context,
    core::{service::ServiceHandle, shutdown, slot::ExitReceiver},
    error::ServiceError,
};

/// Blocks until a runner exits, `signal` fires, or `ctx` is done.
pub(crate) async fn wait_for_trigger<S>(
    ctx: &Context,
    exits: &mut ExitReceiver,
    signal: S,
    handle: &ServiceHandle,
) -> Result<(), ServiceError>
where
    S: Future<Output = &'static str>,
{
    tokio::select! {
        exit = &mut *exits => match exit {
            Ok(exit) => exit.into_result(),
            Err(_closed) => Ok(()),
        },
        sig = signal => {
            tracing::info!(parent: ctx.span(), signal = sig, "received signal, stopping runners");
            handle.record_signal();
            Ok(())
        }
        err = ctx.done() => match exits.try_recv() {
            Ok(exit) => exit.into_result(),
            Err(_) => Err(ServiceError::Context(err)),
        },
    }
}

/// Waits for SIGINT/SIGTERM.
///
/// If the handlers cannot be installed the failure is logged and the returned
/// future never completes, leaving the other wait branches in charge.
pub(crate) async fn os_signal(ctx: Context) -> &'static str {
    match shutdown::wait_for_shutdown_signal().await {
        Ok(name) => name,
        Err(err) => {
            tracing::error!(parent: ctx.span(), error = %err, "unable to install signal handlers");
            std::future::pending().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::{
        core::slot::{ExitSlot, RunnerExit},
        error::{ContextError, RunnerError},
    };

    fn never() -> impl Future<Output = &'static str> {
        std::future::pending()
    }

    #[tokio::test]
    async fn test_runner_error_wins() {
        let handle = ServiceHandle::new("wait");
        let (slot, mut rx) = ExitSlot::new();
        slot.offer(RunnerExit {
            runner: "grpc".into(),
            result: Err(RunnerError::fail("bind failed")),
        });

        let res = wait_for_trigger(&Context::background(), &mut rx, never(), &handle).await;
        match res {
            Err(ServiceError::Runner { runner, .. }) => assert_eq!(runner, "grpc"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(handle.signal_received_at().is_none());
    }

    #[tokio::test]
    async fn test_clean_runner_exit_is_ok() {
        let handle = ServiceHandle::new("wait");
        let (slot, mut rx) = ExitSlot::new();
        slot.offer(RunnerExit {
            runner: "batch".into(),
            result: Ok(()),
        });

        let res = wait_for_trigger(&Context::background(), &mut rx, never(), &handle).await;
        assert!(res.is_ok());
    }

    #[tokio::test]
    async fn test_signal_records_timestamp() {
        let handle = ServiceHandle::new("wait");
        let (_slot, mut rx) = ExitSlot::new();

        let res = wait_for_trigger(
            &Context::background(),
            &mut rx,
            async { "SIGTERM" },
            &handle,
        )
        .await;
        assert!(res.is_ok());
        assert!(handle.signal_received_at().is_some());
    }

    #[tokio::test]
    async fn test_context_deadline_without_pending_exit() {
        let handle = ServiceHandle::new("wait");
        let (_slot, mut rx) = ExitSlot::new();
        let ctx = Context::background().with_timeout(Duration::from_millis(20));

        let res = wait_for_trigger(&ctx, &mut rx, never(), &handle).await;
        assert!(matches!(
            res,
            Err(ServiceError::Context(ContextError::DeadlineExceeded))
        ));
    }

    #[tokio::test]
    async fn test_context_cancel_reports_canceled() {
        let handle = ServiceHandle::new("wait");
        let (_slot, mut rx) = ExitSlot::new();
        let ctx = Context::background();
        ctx.cancel();

        let res = wait_for_trigger(&ctx, &mut rx, never(), &handle).await;
        assert!(matches!(res, Err(ServiceError::Context(ContextError::Canceled))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_os_sigterm_is_observed() {
        let sig = os_signal(Context::background());
        tokio::pin!(sig);
        // First poll installs the handlers; the signal must not arrive before that.
        assert!(futures::poll!(sig.as_mut()).is_pending());

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .expect("kill is available");
        assert!(status.success());

        let name = tokio::time::timeout(Duration::from_secs(2), sig)
            .await
            .expect("SIGTERM should be delivered to the listener");
        assert_eq!(name, "SIGTERM");
    }
}
