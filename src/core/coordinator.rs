//! # Shutdown coordinator: stop every runner in parallel under one deadline.
//!
//! ```text
//! stop_all(ctx, runners, cfg)
//!   ├─► stop_ctx = ctx.with_timeout(cfg.shutdown_timeout)
//!   ├─► spawn runner[0].stop(stop_ctx) ... spawn runner[N-1].stop(stop_ctx)
//!   └─► join each until the shared deadline:
//!         ├─ Ok                 → stopped
//!         ├─ DeadlineExceeded   → "did not stop within the allocated time [15.0s]"
//!         ├─ other error/panic  → "error stopping runner"
//!         └─ still running      → same as DeadlineExceeded, task detached (never aborted)
//! ```
//!
//! ## Rules
//! - Every runner gets exactly one `stop` call, whatever the others do.
//! - The coordinator never fails: outcomes are logged and returned as a [`ShutdownReport`].
//! - Its own wait is bounded by the shutdown deadline even if a `stop` is not.

use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::{context::Context, core::config::Config, error::RunnerError, runners::RunnerRef};

/// Per-runner outcome of one shutdown.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Runners whose `stop` returned `Ok`.
    pub stopped: Vec<String>,
    /// Runners whose `stop` failed (or panicked) for another reason than the deadline.
    pub failed: Vec<String>,
    /// Runners that did not stop within the shutdown timeout.
    pub timed_out: Vec<String>,
}

impl ShutdownReport {
    /// True when every runner stopped cleanly.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.timed_out.is_empty()
    }
}

/// Stops all `runners` concurrently and waits for them up to `cfg.shutdown_timeout`.
pub(crate) async fn stop_all(
    ctx: &Context,
    runners: &[RunnerRef],
    cfg: &Config,
) -> ShutdownReport {
    let stop_ctx = ctx.with_timeout(cfg.shutdown_timeout);
    let deadline = stop_ctx
        .deadline()
        .unwrap_or_else(|| Instant::now() + cfg.shutdown_timeout);

    let handles: Vec<(String, JoinHandle<Result<(), RunnerError>>)> = runners
        .iter()
        .map(|runner| {
            let runner = RunnerRef::clone(runner);
            let c = stop_ctx.clone();
            let name = runner.name().to_string();
            (name, tokio::spawn(async move { runner.stop(c).await }))
        })
        .collect();

    let timeout_msg = format!(
        "runner did not stop within the allocated time [{:.1}s]",
        cfg.shutdown_timeout_secs()
    );
    let mut report = ShutdownReport::default();
    for (name, mut handle) in handles {
        match time::timeout_at(deadline, &mut handle).await {
            Ok(Ok(Ok(()))) => {
                tracing::debug!(parent: ctx.span(), runner = %name, "runner stopped");
                report.stopped.push(name);
            }
            Ok(Ok(Err(RunnerError::DeadlineExceeded))) | Err(_) => {
                tracing::error!(
                    parent: ctx.span(),
                    runner = %name,
                    error = %timeout_msg,
                    "error stopping runner"
                );
                report.timed_out.push(name);
            }
            Ok(Ok(Err(err))) => {
                tracing::error!(
                    parent: ctx.span(),
                    runner = %name,
                    error = %err,
                    "error stopping runner"
                );
                report.failed.push(name);
            }
            Ok(Err(join_err)) => {
                tracing::error!(
                    parent: ctx.span(),
                    runner = %name,
                    error = %join_err,
                    "error stopping runner"
                );
                report.failed.push(name);
            }
        }
    }
    report
}
