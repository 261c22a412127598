//! Error types used by the runvisor service and its runners.
//!
//! This module defines three error enums:
//!
//! - [`ServiceError`]: errors surfaced by [`Service::run`](crate::Service::run).
//! - [`RunnerError`]: errors returned by [`Runner::start`](crate::Runner::start)
//!   and [`Runner::stop`](crate::Runner::stop).
//! - [`ContextError`]: why a [`Context`](crate::Context) is done.
//!
//! All of them provide [`as_label`](ServiceError::as_label) for logs/metrics.

use thiserror::Error;

/// Boxed error returned by user-supplied setup functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// # Reason a [`Context`](crate::Context) is done.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    /// The context (or one of its parents) was cancelled.
    #[error("context canceled")]
    Canceled,

    /// The context deadline elapsed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

impl ContextError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ContextError::Canceled => "context_canceled",
            ContextError::DeadlineExceeded => "context_deadline_exceeded",
        }
    }
}

/// # Errors produced by runners.
///
/// Returned from both `start` and `stop`. A `stop` that could not finish
/// before its context deadline must return [`RunnerError::DeadlineExceeded`]
/// so the shutdown coordinator can report it as such.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RunnerError {
    /// The operation did not finish before the context deadline.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The operation was cancelled through its context.
    #[error("canceled")]
    Canceled,

    /// The runner panicked while running.
    #[error("runner panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },

    /// The runner failed.
    #[error("runner failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// I/O failure (listeners, sockets, files).
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    /// Shorthand for [`RunnerError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        RunnerError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use runvisor::RunnerError;
    ///
    /// assert_eq!(RunnerError::DeadlineExceeded.as_label(), "runner_deadline_exceeded");
    /// assert_eq!(RunnerError::fail("boom").as_label(), "runner_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RunnerError::DeadlineExceeded => "runner_deadline_exceeded",
            RunnerError::Canceled => "runner_canceled",
            RunnerError::Panicked { .. } => "runner_panicked",
            RunnerError::Fail { .. } => "runner_failed",
            RunnerError::Io(_) => "runner_io",
        }
    }

    /// True for [`RunnerError::DeadlineExceeded`].
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, RunnerError::DeadlineExceeded)
    }
}

impl From<ContextError> for RunnerError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Canceled => RunnerError::Canceled,
            ContextError::DeadlineExceeded => RunnerError::DeadlineExceeded,
        }
    }
}

/// # Errors surfaced by [`Service::run`](crate::Service::run).
///
/// Stop failures never show up here: shutdown is best-effort and only logged.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The setup function returned an error.
    #[error("unable to initialise runners: {source}")]
    Setup {
        /// Error returned by the setup function.
        #[source]
        source: BoxError,
    },

    /// The setup function panicked.
    #[error("unable to initialise runners: panic during runner setup: {message}")]
    SetupPanic {
        /// Panic payload rendered as text.
        message: String,
        /// Set when the panic payload was itself an error.
        #[source]
        source: Option<BoxError>,
    },

    /// The setup function did not finish before the setup deadline.
    #[error("unable to initialise runners: runner setup exceeded deadline: {source}")]
    SetupDeadline {
        /// Why the setup context ended.
        #[source]
        source: ContextError,
    },

    /// A runner's `start` returned an error (or panicked) and triggered shutdown.
    #[error("runner {runner:?} terminated: {source}")]
    Runner {
        /// Name of the runner that triggered shutdown.
        runner: String,
        /// Error returned by the runner.
        #[source]
        source: RunnerError,
    },

    /// The run context ended before any runner did.
    #[error(transparent)]
    Context(#[from] ContextError),
}

impl ServiceError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use runvisor::{ContextError, ServiceError};
    ///
    /// let err = ServiceError::SetupDeadline { source: ContextError::DeadlineExceeded };
    /// assert_eq!(err.as_label(), "service_setup_deadline");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceError::Setup { .. } => "service_setup_failed",
            ServiceError::SetupPanic { .. } => "service_setup_panic",
            ServiceError::SetupDeadline { .. } => "service_setup_deadline",
            ServiceError::Runner { .. } => "service_runner_failed",
            ServiceError::Context(_) => "service_context_done",
        }
    }

    /// True when the error stems from an elapsed deadline (setup or run).
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(
            self,
            ServiceError::SetupDeadline {
                source: ContextError::DeadlineExceeded
            } | ServiceError::Context(ContextError::DeadlineExceeded)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_error_maps_to_runner_error() {
        assert!(RunnerError::from(ContextError::DeadlineExceeded).is_deadline_exceeded());
        assert!(matches!(
            RunnerError::from(ContextError::Canceled),
            RunnerError::Canceled
        ));
    }

    #[test]
    fn test_setup_panic_message() {
        let err = ServiceError::SetupPanic {
            message: "boom".into(),
            source: None,
        };
        assert_eq!(
            err.to_string(),
            "unable to initialise runners: panic during runner setup: boom"
        );
    }

    #[test]
    fn test_deadline_classification() {
        assert!(ServiceError::Context(ContextError::DeadlineExceeded).is_deadline_exceeded());
        assert!(!ServiceError::Context(ContextError::Canceled).is_deadline_exceeded());
        let runner = ServiceError::Runner {
            runner: "grpc".into(),
            source: RunnerError::DeadlineExceeded,
        };
        assert!(!runner.is_deadline_exceeded());
        assert_eq!(runner.as_label(), "service_runner_failed");
    }
}
