use std::future::Future;
use std::time::Duration;

use futures::FutureExt;

use super::{config::Config, service::Service};

/// Builder for constructing a [`Service`] with optional settings.
pub struct ServiceBuilder {
    name: String,
    cfg: Config,
    signal: Option<futures::future::BoxFuture<'static, ()>>,
}

impl ServiceBuilder {
    /// Creates a new builder with the default configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cfg: Config::default(),
            signal: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn with_config(mut self, cfg: Config) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets the deadline shared by all runner `stop` calls.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.cfg.shutdown_timeout = timeout;
        self
    }

    /// Sets the deadline for the setup function.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.cfg.timeout = timeout;
        self
    }

    /// Replaces OS signal handling with `signal`.
    ///
    /// When the future completes the service behaves as if SIGTERM was received.
    /// Useful for embedding the service in a larger program, and in tests.
    pub fn with_shutdown_signal<S>(mut self, signal: S) -> Self
    where
        S: Future<Output = ()> + Send + 'static,
    {
        self.signal = Some(signal.boxed());
        self
    }

    /// Builds the service.
    pub fn build(self) -> Service {
        Service::new_internal(self.name, self.cfg, self.signal)
    }
}
