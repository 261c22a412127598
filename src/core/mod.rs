//! Runtime core: orchestration and lifecycle.
//!
//! The public API from this module is [`Service`] (with [`ServiceBuilder`] and
//! [`ServiceHandle`]), its [`Config`], the [`Setup`] value returned by setup
//! functions, and the [`ShutdownReport`] of the coordinator.
//!
//! Internal modules:
//! - [`service`]: one run of the lifecycle, start to teardown;
//! - [`setup`]: panic-safe, deadline-bound setup;
//! - [`wait`]: selects the trigger that ends the run;
//! - [`coordinator`]: stops every runner in parallel under one deadline;
//! - [`hooks`]: shutdown callbacks run after the coordinator;
//! - [`slot`]: records the first runner to exit;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod builder;
mod config;
mod coordinator;
mod hooks;
mod service;
mod setup;
mod shutdown;
mod slot;
mod wait;

pub use builder::ServiceBuilder;
pub use config::Config;
pub use coordinator::ShutdownReport;
pub use service::{Service, ServiceHandle, run};
pub use setup::Setup;
