//! # runvisor
//!
//! **Runvisor** is a small lifecycle orchestrator for long-running processes.
//!
//! A process is described as a set of *runners* (servers, consumers, background
//! loops). Runvisor builds them through a user setup function, starts them all
//! concurrently, waits for the first reason to stop (a runner exiting, a
//! termination signal, or the run context ending), and then stops every runner
//! in parallel under one shared deadline.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                       ┌──────────────────────────┐
//!                       │  setup(ctx, ServiceHandle)│  panic-safe, `timeout`-bound
//!                       └────────────┬─────────────┘
//!                                    ▼ Setup { runners, ctx }
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Service (one run)                                                │
//! │  - ExitSlot (first runner to return wins)                         │
//! │  - ServiceHandle (shutdown hooks, signal timestamp, report)       │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   │
//!     │   Runner     │   │   Runner     │   │ DrainBarrier │   │
//!     │  start(ctx)  │   │  start(ctx)  │   │ (holds exit) │   │
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘   │
//!      └──────── first exit ─────────────────┘                 │
//!                                    ▼                         ▼
//!              wait: runner exit | SIGINT/SIGTERM | ctx done
//!                                    ▼
//!              coordinator: stop(ctx) on every runner, `shutdown_timeout`
//!                                    ▼
//!              shutdown hooks → drain barriers finish → "service stopped"
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                         |
//! |-------------------|--------------------------------------------------------------|--------------------------------------------|
//! | **Runners**       | Components with a blocking `start` and a bounded `stop`.     | [`Runner`], [`RunnerRef`], [`RunnerFn`]    |
//! | **Drain barrier** | Keeps the process alive until fire-and-forget work finished. | [`DrainBarrier`]                           |
//! | **Service**       | Setup, concurrent start, wait, coordinated shutdown.         | [`Service`], [`ServiceBuilder`], [`run`]   |
//! | **Context**       | Cancellation, deadline and logger in one value.              | [`Context`]                                |
//! | **Errors**        | Typed errors for setup, runners and contexts.                | [`ServiceError`], [`RunnerError`]          |
//! | **Configuration** | Setup and shutdown deadlines.                                | [`Config`]                                 |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use runvisor::{Context, DrainBarrier, RunnerError, RunnerFn, RunnerRef, Service, Setup};
//!
//! #[tokio::main]
//! async fn main() {
//!     let result = Service::builder("worker")
//!         .with_shutdown_timeout(Duration::from_secs(10))
//!         .build()
//!         .run(|ctx: Context, svc| async move {
//!             let audit = DrainBarrier::new();
//!
//!             let jobs = audit.clone();
//!             let ticker: RunnerRef = RunnerFn::arc("ticker", move |ctx: Context| {
//!                 let jobs = jobs.clone();
//!                 async move {
//!                     loop {
//!                         tokio::select! {
//!                             _ = ctx.done() => return Ok::<_, RunnerError>(()),
//!                             _ = tokio::time::sleep(Duration::from_secs(1)) => {
//!                                 jobs.submit(async { /* flush audit record */ });
//!                             }
//!                         }
//!                     }
//!                 }
//!             });
//!
//!             svc.on_shutdown(|ctx: Context| async move {
//!                 tracing::info!(parent: ctx.span(), "closing database pool");
//!             });
//!
//!             let audit: RunnerRef = Arc::new(audit);
//!             Ok(Setup::new([ticker, audit]).with_context(ctx))
//!         })
//!         .await;
//!
//!     if let Err(err) = result {
//!         tracing::error!(error = %err, "service failed");
//!         std::process::exit(1);
//!     }
//! }
//! ```
mod context;
mod core;
mod error;
mod runners;

// ---- Public re-exports ----

pub use context::Context;
pub use core::{Config, Service, ServiceBuilder, ServiceHandle, Setup, ShutdownReport, run};
pub use error::{BoxError, ContextError, RunnerError, ServiceError};
pub use runners::{DrainBarrier, Runner, RunnerFn, RunnerRef};
