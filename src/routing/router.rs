//! Route registration and lookup.
//!
//! # Responsibilities
//! - Store registered routes in registration order
//! - Resolve (method, path) to zero, one or many candidates
//! - Delegate ambiguous matches to an `AmbiguityResolver`
//!
//! # Design Decisions
//! - Read-mostly `parking_lot::RwLock`: concurrent resolves, serialized registration
//! - The lock is released before any resolver, handler or callback runs
//! - O(n) scan over routes of the requested method (acceptable for typical route counts)
//! - Overlapping routes are allowed; ambiguity is a resolution-time policy
//! - Explicit NotFound (`None`) rather than silent default

use std::sync::Arc;

use parking_lot::RwLock;

use crate::http::method::HttpMethod;
use crate::observability::metrics;
use crate::routing::ambiguity::{AmbiguityResolver, RefuseAmbiguous};
use crate::routing::descriptor::{
    ExceptionMapper, HandlerFactory, RouteDescriptor, RouteDescriptorBuilder,
};
use crate::routing::invocation::BoundInvocation;
use crate::routing::matcher::split_path;
use crate::routing::template::{InvalidPathTemplateError, PathTemplate};

/// Ordered, thread-safe collection of routes.
pub struct RouteRegistry {
    routes: RwLock<Vec<Arc<RouteDescriptor>>>,
    resolver: Box<dyn AmbiguityResolver>,
}

impl RouteRegistry {
    /// Empty registry refusing ambiguous matches.
    pub fn new() -> Self {
        Self::with_resolver(RefuseAmbiguous)
    }

    /// Empty registry with a custom default ambiguity policy.
    pub fn with_resolver<R: AmbiguityResolver + 'static>(resolver: R) -> Self {
        Self {
            routes: RwLock::new(Vec::new()),
            resolver: Box::new(resolver),
        }
    }

    /// Append a built descriptor.
    pub fn register_route(&self, descriptor: RouteDescriptor) -> Arc<RouteDescriptor> {
        let descriptor = Arc::new(descriptor);
        self.routes.write().push(descriptor.clone());
        tracing::debug!(route = %descriptor.key(), "Registered route");
        descriptor
    }

    /// Compile `pattern` and register a route in one step.
    pub fn register<F, I, J, S, T>(
        &self,
        method: HttpMethod,
        pattern: &str,
        factory: F,
        required_headers: I,
        required_params: J,
        exception_mapper: Option<Arc<dyn ExceptionMapper>>,
    ) -> Result<Arc<RouteDescriptor>, InvalidPathTemplateError>
    where
        F: HandlerFactory + 'static,
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        let template = PathTemplate::compile(method, pattern)?;
        let mut builder = RouteDescriptorBuilder::new(template, Arc::new(factory))
            .required_headers(required_headers)
            .required_params(required_params);
        if let Some(mapper) = exception_mapper {
            builder = builder.shared_exception_mapper(mapper);
        }
        Ok(self.register_route(builder.build()))
    }

    /// Resolve using the registry's configured ambiguity policy.
    pub fn resolve(&self, method: HttpMethod, raw_path: &str) -> Option<BoundInvocation> {
        self.resolve_with(method, raw_path, self.resolver.as_ref())
    }

    /// Resolve with an explicit ambiguity policy.
    pub fn resolve_with(
        &self,
        method: HttpMethod,
        raw_path: &str,
        resolver: &dyn AmbiguityResolver,
    ) -> Option<BoundInvocation> {
        let mut candidates = self.candidates(method, raw_path);
        match candidates.len() {
            0 => {
                metrics::record_resolution("not_found");
                tracing::debug!(method = %method, path = %raw_path, "No route matched");
                None
            }
            1 => {
                metrics::record_resolution("matched");
                candidates.pop()
            }
            _ => {
                metrics::record_resolution("ambiguous");
                resolver.resolve(raw_path, candidates)
            }
        }
    }

    /// Every route matching the request, in registration order.
    ///
    /// Hosts that want to try several candidates (e.g. by precondition) use
    /// this instead of `resolve`.
    pub fn candidates(&self, method: HttpMethod, raw_path: &str) -> Vec<BoundInvocation> {
        let segments = split_path(raw_path);
        let routes = self.routes.read();
        routes
            .iter()
            .filter(|d| d.method() == method)
            .filter_map(|d| {
                d.template()
                    .matches(&segments)
                    .map(|vars| BoundInvocation::new(raw_path, d.clone(), vars))
            })
            .collect()
    }

    /// Snapshot of all registered routes.
    pub fn descriptors(&self) -> Vec<Arc<RouteDescriptor>> {
        self.routes.read().clone()
    }

    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }
}

impl Default for RouteRegistry {
    fn default() -> Self {
        Self::new()
    }
}
