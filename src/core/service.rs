//! # Service: owns one run of the process lifecycle.
//!
//! The [`Service`] runs a user setup function, starts every runner it returns,
//! waits for a trigger and then stops everything.
//!
//! ## High-level flow
//! ```text
//! Service::run(setup)
//!   ├─► root ctx (span: service=<name>)           "service starting"
//!   ├─► run_setup(root.child(), timeout)           panic-safe, deadline-bound
//!   │       └─ Err → return (nothing started)
//!   ├─► begin(runner) for each runner              one task each
//!   │       └─ start() returns → "runner terminated" → ExitSlot (first wins)
//!   ├─► wait_for_trigger(exit | signal | ctx done)
//!   ├─► teardown (always, exactly once; spawned on drop if `run` is abandoned):
//!   │       ├─ stop_all(shutdown_timeout)          parallel, bounded
//!   │       ├─ run_hooks(shutdown_timeout)         registration order
//!   │       └─ await start() of exit-holding runners (drain barriers), unbounded
//!   └─► "service stopped" [shutdown_duration_ms]   on every exit path
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use runvisor::{Context, DrainBarrier, RunnerRef, Service, Setup};
//!
//! #[tokio::main]
//! async fn main() {
//!     let result = Service::builder("greeter")
//!         .build()
//!         .run(|ctx: Context, svc| async move {
//!             svc.on_shutdown(|ctx: Context| async move {
//!                 tracing::info!(parent: ctx.span(), "shutdown");
//!             });
//!             let barrier: RunnerRef = Arc::new(DrainBarrier::new());
//!             Ok(Setup::new([barrier]).with_context(ctx))
//!         })
//!         .await;
//!
//!     if let Err(err) = result {
//!         tracing::error!(error = %err, "failed to start service");
//!         std::process::exit(1);
//!     }
//! }
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::{FutureExt, future::BoxFuture};
use tokio::task::JoinHandle;
use tracing::Span;

use crate::{
    context::Context,
    core::{
        builder::ServiceBuilder,
        config::Config,
        coordinator::{self, ShutdownReport},
        hooks::{self, Hooks},
        setup::{self, Setup},
        slot::{ExitSlot, RunnerExit},
        wait,
    },
    error::{BoxError, RunnerError, ServiceError},
    runners::RunnerRef,
};

struct Shared {
    name: String,
    hooks: Hooks,
    /// Unix nanoseconds of the last termination signal; 0 = none.
    signal_at: AtomicI64,
    report: Mutex<Option<ShutdownReport>>,
}

/// Handle passed to the setup function.
///
/// Cheap to clone. Used to register shutdown hooks and to observe the service.
#[derive(Clone)]
pub struct ServiceHandle {
    shared: Arc<Shared>,
}

impl ServiceHandle {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                hooks: Hooks::default(),
                signal_at: AtomicI64::new(0),
                report: Mutex::new(None),
            }),
        }
    }

    /// Returns the configured service name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Registers a callback to run during teardown, after every runner was stopped.
    ///
    /// Returns `self` so registrations can be chained.
    pub fn on_shutdown<F, Fut>(&self, hook: F) -> &Self
    where
        F: FnOnce(Context) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.shared.hooks.push(hook);
        self
    }

    /// Wall-clock time at which a termination signal was received, if any.
    pub fn signal_received_at(&self) -> Option<SystemTime> {
        match self.shared.signal_at.load(Ordering::Acquire) {
            0 => None,
            nanos => Some(UNIX_EPOCH + Duration::from_nanos(nanos as u64)),
        }
    }

    /// Outcome of the shutdown coordinator, once teardown has stopped the runners.
    pub fn shutdown_report(&self) -> Option<ShutdownReport> {
        self.shared
            .report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stores the signal time; only the first call has an effect.
    pub(crate) fn record_signal(&self) {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(1)
            .max(1);
        let _ = self.shared.signal_at.compare_exchange(
            0,
            nanos,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Time elapsed since the termination signal, if one was received.
    pub(crate) fn shutdown_duration(&self) -> Option<Duration> {
        self.signal_received_at()
            .and_then(|at| SystemTime::now().duration_since(at).ok())
    }
}

impl std::fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("name", &self.shared.name)
            .field("hooks", &self.shared.hooks.len())
            .finish()
    }
}

/// Logs "service stopped" on drop, with the shutdown duration when a signal initiated the stop.
struct StoppedLog {
    span: Span,
    handle: ServiceHandle,
}

impl Drop for StoppedLog {
    fn drop(&mut self) {
        match self.handle.shutdown_duration() {
            Some(took) => tracing::info!(
                parent: &self.span,
                shutdown_duration_ms = took.as_millis() as u64,
                "service stopped"
            ),
            None => tracing::info!(parent: &self.span, "service stopped"),
        }
    }
}

/// Runners started by one run.
struct Active {
    runners: Vec<RunnerRef>,
    /// `start` tasks of runners that hold process exit.
    holders: Vec<(String, JoinHandle<()>)>,
}

/// Owns the started runners until teardown has been launched.
///
/// [`Service::run`] launches teardown itself and awaits it. If the `run` future
/// is dropped first, `Drop` launches it on the current runtime instead, so the
/// runners are still stopped and the hooks still run.
struct TeardownGuard {
    ctx: Context,
    cfg: Config,
    handle: ServiceHandle,
    pending: Option<(Active, StoppedLog)>,
}

impl TeardownGuard {
    /// Spawns teardown once; later calls return `None`.
    fn launch(&mut self) -> Option<JoinHandle<()>> {
        let (active, stopped) = self.pending.take()?;
        let rt = match tokio::runtime::Handle::try_current() {
            Ok(rt) => rt,
            Err(err) => {
                tracing::error!(parent: self.ctx.span(), error = %err, "unable to stop runners");
                return None;
            }
        };

        let (ctx, cfg, handle) = (self.ctx.clone(), self.cfg.clone(), self.handle.clone());
        Some(rt.spawn(async move {
            teardown(&ctx, &cfg, &handle, active).await;
            drop(stopped);
        }))
    }

    /// Runs teardown to completion; it keeps going in the background if this future is dropped.
    async fn finish(mut self) {
        if let Some(join) = self.launch() {
            let _ = join.await;
        }
    }
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        if self.pending.is_some() {
            tracing::warn!(
                parent: self.ctx.span(),
                "run abandoned, stopping runners in the background"
            );
            self.launch();
        }
    }
}

/// Orchestrates one run: setup, concurrent start, wait, coordinated stop.
pub struct Service {
    cfg: Config,
    handle: ServiceHandle,
    signal: Option<BoxFuture<'static, ()>>,
}

impl Service {
    /// Creates a service listening to OS termination signals.
    pub fn new(name: impl Into<String>, cfg: Config) -> Self {
        Self::new_internal(name, cfg, None)
    }

    pub(crate) fn new_internal(
        name: impl Into<String>,
        cfg: Config,
        signal: Option<BoxFuture<'static, ()>>,
    ) -> Self {
        Self {
            cfg,
            handle: ServiceHandle::new(name),
            signal,
        }
    }

    /// Creates a builder with default configuration.
    pub fn builder(name: impl Into<String>) -> ServiceBuilder {
        ServiceBuilder::new(name)
    }

    /// Returns the configured service name.
    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Returns a handle sharing hooks and signal state with this service.
    pub fn handle(&self) -> ServiceHandle {
        self.handle.clone()
    }

    /// Runs the whole lifecycle and returns the error that ended it, if any.
    ///
    /// - Setup failure (error, panic, deadline) → returned, nothing started.
    /// - First runner exit → everything stopped, its error returned (`Ok` for a clean exit).
    /// - Termination signal → everything stopped, `Ok(())`.
    /// - Context done → everything stopped, pending runner error or the context error.
    ///
    /// Dropping the returned future once runners have started still stops them:
    /// teardown then runs on a background task.
    pub async fn run<F, Fut>(self, setup: F) -> Result<(), ServiceError>
    where
        F: FnOnce(Context, ServiceHandle) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Setup, BoxError>> + Send + 'static,
    {
        let Service {
            cfg,
            handle,
            signal,
        } = self;

        let span = tracing::info_span!("service", service = %handle.name());
        let root = Context::new(span.clone());
        let stopped = StoppedLog {
            span,
            handle: handle.clone(),
        };

        tracing::info!(parent: root.span(), "service starting");
        if let Ok(n) = std::thread::available_parallelism() {
            tracing::info!(
                parent: root.span(),
                available_parallelism = n.get(),
                "runtime parallelism"
            );
        }

        let (runners, ctx) =
            setup::run_setup(root.child(), cfg.timeout, handle.clone(), setup).await?;

        let (slot, mut exits) = ExitSlot::new();
        let active = begin_all(&ctx, runners, Arc::new(slot));
        let started = !active.runners.is_empty();
        let guard = TeardownGuard {
            ctx: ctx.clone(),
            cfg,
            handle: handle.clone(),
            pending: Some((active, stopped)),
        };

        let result = if started {
            let signal_ctx = ctx.clone();
            let signal = async move {
                match signal {
                    Some(fut) => {
                        fut.await;
                        "external"
                    }
                    None => wait::os_signal(signal_ctx).await,
                }
            };
            wait::wait_for_trigger(&ctx, &mut exits, signal, &handle).await
        } else {
            Ok(())
        };

        guard.finish().await;
        result
    }
}

/// Runs a service named `name` with the default [`Config`].
///
/// Shorthand for `Service::new(name, Config::default()).run(setup)`.
pub async fn run<F, Fut>(name: impl Into<String>, setup: F) -> Result<(), ServiceError>
where
    F: FnOnce(Context, ServiceHandle) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Setup, BoxError>> + Send + 'static,
{
    Service::new(name, Config::default()).run(setup).await
}

/// Starts every runner on its own task.
fn begin_all(ctx: &Context, runners: Vec<RunnerRef>, slot: Arc<ExitSlot>) -> Active {
    let mut holders = Vec::new();
    for runner in &runners {
        let join = begin(ctx, RunnerRef::clone(runner), Arc::clone(&slot));
        if runner.holds_exit() {
            holders.push((runner.name().to_string(), join));
        }
    }
    Active { runners, holders }
}

/// Starts one runner; its termination is logged and offered to `slot`.
fn begin(ctx: &Context, runner: RunnerRef, slot: Arc<ExitSlot>) -> JoinHandle<()> {
    let ctx = ctx.clone();
    tokio::spawn(async move {
        let name = runner.name().to_string();
        let result = match AssertUnwindSafe(runner.start(ctx.clone()))
            .catch_unwind()
            .await
        {
            Ok(res) => res,
            Err(payload) => Err(RunnerError::Panicked {
                message: setup::panic_message(payload.as_ref()),
            }),
        };

        match &result {
            Ok(()) => tracing::info!(parent: ctx.span(), runner = %name, "runner terminated"),
            Err(err) => tracing::info!(
                parent: ctx.span(),
                runner = %name,
                error = %err,
                "runner terminated"
            ),
        }
        slot.offer(RunnerExit {
            runner: name,
            result,
        });
    })
}

/// Stops every runner, runs hooks, then waits for exit-holding runners to finish.
async fn teardown(ctx: &Context, cfg: &Config, handle: &ServiceHandle, active: Active) {
    // Detached from the run context's cancellation and deadline; keeps its logger.
    let base = Context::new(ctx.span().clone());

    let report = coordinator::stop_all(&base, &active.runners, cfg).await;
    if !active.runners.is_empty() {
        tracing::info!(
            parent: ctx.span(),
            stopped = report.stopped.len(),
            failed = report.failed.len(),
            timed_out = report.timed_out.len(),
            "runners stopped"
        );
    }
    *handle
        .shared
        .report
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(report);

    let hook_ctx = base.with_timeout(cfg.shutdown_timeout);
    hooks::run_hooks(&hook_ctx, handle.shared.hooks.take()).await;

    for (name, join) in active.holders {
        tracing::info!(parent: ctx.span(), runner = %name, "waiting for runner to complete");
        let _ = join.await;
    }
}
