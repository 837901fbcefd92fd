//! A request bound to a matched route.
//!
//! # Responsibilities
//! - Carry the raw path, the matched descriptor and the extracted variables
//! - Check invocation preconditions without side effects
//! - Obtain a handler from the factory and call it
//!
//! # Design Decisions
//! - Request-scoped; the descriptor is shared with the registry via `Arc`
//! - Headers are checked before params, params before filter and MIME type
//! - Precondition misses are values, not errors; status codes are a host concern

use std::fmt;
use std::sync::Arc;

use crate::error::{ConfigurationError, InvocationError};
use crate::http::request::RequestContext;
use crate::http::response::ResponseSink;
use crate::routing::descriptor::RouteDescriptor;
use crate::routing::template::PathVariables;

/// Why a bound invocation may not run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreconditionFailure {
    MissingHeader(String),
    MissingParam(String),
    /// The route's execution filter declined the request.
    RejectedByFilter,
    /// Content-Type not in the route's allowed list. Empty if none was sent.
    UnsupportedMediaType(String),
}

impl fmt::Display for PreconditionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreconditionFailure::MissingHeader(name) => write!(f, "missing required header '{name}'"),
            PreconditionFailure::MissingParam(name) => {
                write!(f, "missing required parameter '{name}'")
            }
            PreconditionFailure::RejectedByFilter => f.write_str("rejected by execution filter"),
            PreconditionFailure::UnsupportedMediaType(ct) => {
                write!(f, "unsupported content type '{ct}'")
            }
        }
    }
}

/// Result of a successful route resolution.
#[derive(Clone)]
pub struct BoundInvocation {
    path: String,
    descriptor: Arc<RouteDescriptor>,
    variables: PathVariables,
}

impl BoundInvocation {
    pub fn new(
        path: impl Into<String>,
        descriptor: Arc<RouteDescriptor>,
        variables: PathVariables,
    ) -> Self {
        Self {
            path: path.into(),
            descriptor,
            variables,
        }
    }

    /// The raw request path this invocation was resolved from.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn descriptor(&self) -> &RouteDescriptor {
        &self.descriptor
    }

    pub fn variables(&self) -> &PathVariables {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    /// True iff every precondition holds.
    pub fn can_execute(&self, request: &dyn RequestContext) -> bool {
        self.check_preconditions(request).is_ok()
    }

    /// Detailed precondition check, stopping at the first miss.
    pub fn check_preconditions(
        &self,
        request: &dyn RequestContext,
    ) -> Result<(), PreconditionFailure> {
        let failure = self.first_failure(request);
        if let Some(failure) = &failure {
            tracing::warn!(
                path = %self.path,
                route = %self.descriptor.key(),
                reason = %failure,
                "Request cannot be executed"
            );
        }
        failure.map_or(Ok(()), Err)
    }

    fn first_failure(&self, request: &dyn RequestContext) -> Option<PreconditionFailure> {
        let d = &self.descriptor;

        if let Some(name) = d.required_header_names().find(|h| request.header(h).is_none()) {
            return Some(PreconditionFailure::MissingHeader(name.to_string()));
        }

        if let Some(name) = d.required_param_names().find(|p| !request.has_parameter(p)) {
            return Some(PreconditionFailure::MissingParam(name.to_string()));
        }

        if let Some(filter) = d.execution_filter() {
            if !filter.can_execute(request) {
                return Some(PreconditionFailure::RejectedByFilter);
            }
        }

        let content_type = request.content_type().unwrap_or_default();
        let mime_type = content_type.split(';').next().unwrap_or_default().trim();
        if !d.accepts_mime_type(mime_type) {
            return Some(PreconditionFailure::UnsupportedMediaType(content_type.to_string()));
        }

        None
    }

    /// Obtain a handler and run it.
    ///
    /// Handler errors are returned unchanged. A factory that yields nothing
    /// is a configuration error.
    pub fn invoke(
        &self,
        request: &dyn RequestContext,
        response: &mut dyn ResponseSink,
    ) -> Result<(), InvocationError> {
        let handler = self.descriptor.create_handler().ok_or_else(|| ConfigurationError {
            route: self.descriptor.key().to_string(),
        })?;

        handler
            .handle(&self.path, &self.variables, request, response)
            .map_err(InvocationError::Handler)
    }
}

impl fmt::Debug for BoundInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundInvocation")
            .field("path", &self.path)
            .field("route", &self.descriptor.key())
            .field("variables", &self.variables)
            .finish()
    }
}
