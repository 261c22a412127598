//! # Service configuration.
//!
//! Provides [`Config`] the settings of one [`Service`](crate::Service) run.
//!
//! ## Deadlines
//! - `timeout` bounds the setup phase only: the setup function and the runner
//!   list it produces must be ready within it. Runners themselves run unbounded.
//! - `shutdown_timeout` bounds the shutdown coordinator: every runner's `stop`
//!   shares one context with this deadline.
//!
//! The configuration is immutable once the service is built.

use std::time::Duration;

/// Configuration for a service run.
///
/// ## Field semantics
/// - `shutdown_timeout`: deadline shared by all `stop` calls
/// - `timeout`: deadline for the setup function
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time the shutdown coordinator waits for runners to stop.
    ///
    /// Runners still stopping at the deadline are reported and abandoned.
    pub shutdown_timeout: Duration,

    /// Maximum time the setup function may take.
    ///
    /// When exceeded, the run fails with
    /// [`ServiceError::SetupDeadline`](crate::ServiceError::SetupDeadline)
    /// and nothing is started.
    pub timeout: Duration,
}

impl Config {
    /// Shutdown timeout in fractional seconds, as printed in stop diagnostics.
    #[inline]
    pub fn shutdown_timeout_secs(&self) -> f64 {
        self.shutdown_timeout.as_secs_f64()
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `shutdown_timeout = 15s`
    /// - `timeout = 60s`
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(15),
            timeout: Duration::from_secs(60),
        }
    }
}
