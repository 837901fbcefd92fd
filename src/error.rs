//! Invocation error types.
//!
//! Expected outcomes (no match, ambiguity, missing preconditions) are values,
//! never errors. Only genuine failures end up here:
//!
//! - [`InvocationError::Handler`] - whatever the handler returned, untouched
//! - [`InvocationError::Configuration`] - a wiring defect (no handler instance)
//! - [`InvocationError::Aborted`] - a before-callback vetoed the call

use thiserror::Error;

/// Boxed error type returned by handlers and callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A handler factory produced no handler instance.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to create handler for route '{route}'")]
pub struct ConfigurationError {
    /// Key of the route whose factory failed.
    pub route: String,
}

/// Failure of a single invocation.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// The handler failed. Display and source are the handler's own.
    #[error(transparent)]
    Handler(BoxError),

    /// The route is wired incorrectly.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A before-execution callback failed; the handler was never called.
    #[error("before-execution callback #{callback} aborted the invocation")]
    Aborted {
        callback: u64,
        #[source]
        source: BoxError,
    },
}

impl InvocationError {
    /// Recover the handler's original error, if this is a handler failure.
    pub fn into_handler_error(self) -> Option<BoxError> {
        match self {
            InvocationError::Handler(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, InvocationError::Configuration(_))
    }
}
