//! # Shutdown hooks.
//!
//! Callbacks registered through [`ServiceHandle::on_shutdown`](crate::ServiceHandle::on_shutdown).
//! They run once, in registration order, after the shutdown coordinator has
//! stopped every runner, under a fresh `shutdown_timeout` context.
//!
//! ## Rules
//! - Each hook runs at most once; the list is drained when taken.
//! - A panicking hook is logged and the next one still runs.
//! - When the context deadline elapses, the running hook is dropped and the
//!   remaining ones are skipped (logged with their count).

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Mutex, PoisonError};

use futures::{FutureExt, future::BoxFuture};

use crate::context::Context;

/// Boxed shutdown hook.
pub(crate) type ShutdownHook = Box<dyn FnOnce(Context) -> BoxFuture<'static, ()> + Send>;

/// Registration list shared between the service and its handles.
#[derive(Default)]
pub(crate) struct Hooks {
    list: Mutex<Vec<ShutdownHook>>,
}

impl Hooks {
    /// Appends a hook.
    pub fn push<F, Fut>(&self, hook: F)
    where
        F: FnOnce(Context) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let boxed: ShutdownHook = Box::new(move |ctx| async move { hook(ctx).await }.boxed());
        self.list
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(boxed);
    }

    /// Removes and returns every registered hook.
    pub fn take(&self) -> Vec<ShutdownHook> {
        std::mem::take(&mut *self.list.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Number of hooks waiting to run.
    pub fn len(&self) -> usize {
        self.list
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Runs `hooks` sequentially until done or until `ctx` is done.
pub(crate) async fn run_hooks(ctx: &Context, hooks: Vec<ShutdownHook>) {
    let total = hooks.len();
    for (idx, hook) in hooks.into_iter().enumerate() {
        let fut = AssertUnwindSafe(hook(ctx.clone())).catch_unwind();
        match ctx.run_until(fut).await {
            Ok(Ok(())) => {}
            Ok(Err(_panic)) => {
                tracing::error!(parent: ctx.span(), hook = idx, "shutdown hook panicked");
            }
            Err(err) => {
                tracing::warn!(
                    parent: ctx.span(),
                    hook = idx,
                    skipped = total - idx - 1,
                    error = %err,
                    "shutdown hooks interrupted"
                );
                return;
            }
        }
    }
}
