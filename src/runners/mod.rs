//! # Runner abstractions.
//!
//! This module provides the runner-related types:
//! - [`Runner`] - trait for long-running components (start/stop/name)
//! - [`RunnerRef`] - shared reference to a runner (`Arc<dyn Runner>`)
//! - [`RunnerFn`] - closure-backed runner stopped through its context
//! - [`DrainBarrier`] - runner that holds process exit until submitted work completes

mod drain;
mod runner;
mod runner_fn;

pub use drain::DrainBarrier;
pub use runner::{Runner, RunnerRef};
pub use runner_fn::RunnerFn;
