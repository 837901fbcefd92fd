//! Route descriptors and the capabilities attached to them.
//!
//! # Responsibilities
//! - Bind a compiled template to a handler factory
//! - Carry invocation preconditions (headers, params, filter, MIME types)
//! - Carry the optional per-route exception mapper
//!
//! # Design Decisions
//! - Built once through `RouteDescriptorBuilder`, frozen behind `Arc` afterwards
//! - Handler instantiation is a strategy (`HandlerFactory`), not a subclass
//! - Empty header/param names are ignored rather than rejected

use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;

use crate::error::BoxError;
use crate::http::method::HttpMethod;
use crate::http::request::RequestContext;
use crate::http::response::ResponseSink;
use crate::routing::invocation::BoundInvocation;
use crate::routing::template::{PathTemplate, PathVariables};

/// The code a route ultimately runs.
pub trait Handler: Send + Sync {
    /// Handle one request.
    ///
    /// `path` is the raw request path and `variables` the values bound by the
    /// route's template.
    fn handle(
        &self,
        path: &str,
        variables: &PathVariables,
        request: &dyn RequestContext,
        response: &mut dyn ResponseSink,
    ) -> Result<(), BoxError>;
}

/// Adapter turning a closure into a [`Handler`].
pub struct FnHandler<F>(F);

/// Wrap a closure as a handler.
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&str, &PathVariables, &dyn RequestContext, &mut dyn ResponseSink) -> Result<(), BoxError>
        + Send
        + Sync,
{
    FnHandler(f)
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&str, &PathVariables, &dyn RequestContext, &mut dyn ResponseSink) -> Result<(), BoxError>
        + Send
        + Sync,
{
    fn handle(
        &self,
        path: &str,
        variables: &PathVariables,
        request: &dyn RequestContext,
        response: &mut dyn ResponseSink,
    ) -> Result<(), BoxError> {
        (self.0)(path, variables, request, response)
    }
}

/// Produces the handler instance for one invocation.
pub trait HandlerFactory: Send + Sync {
    /// `None` signals a wiring defect and fails the invocation.
    fn create(&self) -> Option<Arc<dyn Handler>>;
}

/// Hands out the same shared instance every time.
pub struct ConstantFactory {
    handler: Arc<dyn Handler>,
}

impl ConstantFactory {
    pub fn new<H: Handler + 'static>(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }
}

impl HandlerFactory for ConstantFactory {
    fn create(&self) -> Option<Arc<dyn Handler>> {
        Some(self.handler.clone())
    }
}

/// Builds a fresh instance for every invocation.
pub struct TransientFactory<F> {
    make: F,
}

impl<F, H> TransientFactory<F>
where
    F: Fn() -> H + Send + Sync,
    H: Handler + 'static,
{
    pub fn new(make: F) -> Self {
        Self { make }
    }
}

impl<F, H> HandlerFactory for TransientFactory<F>
where
    F: Fn() -> H + Send + Sync,
    H: Handler + 'static,
{
    fn create(&self) -> Option<Arc<dyn Handler>> {
        Some(Arc::new((self.make)()))
    }
}

/// Delegates to a custom supplier that may decline.
pub struct SupplierFactory<F> {
    supply: F,
}

impl<F> SupplierFactory<F>
where
    F: Fn() -> Option<Arc<dyn Handler>> + Send + Sync,
{
    pub fn new(supply: F) -> Self {
        Self { supply }
    }
}

impl<F> HandlerFactory for SupplierFactory<F>
where
    F: Fn() -> Option<Arc<dyn Handler>> + Send + Sync,
{
    fn create(&self) -> Option<Arc<dyn Handler>> {
        (self.supply)()
    }
}

/// Outcome of an exception mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionMapping {
    /// The mapper wrote a response; the error is not propagated.
    Handled,
    /// The error continues to exception observers and the caller.
    NotHandled,
}

/// Per-route conversion of a handler failure into a response.
pub trait ExceptionMapper: Send + Sync {
    fn map_exception(
        &self,
        bound: &BoundInvocation,
        request: &dyn RequestContext,
        response: &mut dyn ResponseSink,
        error: &(dyn std::error::Error + Send + Sync + 'static),
    ) -> ExceptionMapping;
}

impl<F> ExceptionMapper for F
where
    F: Fn(
            &BoundInvocation,
            &dyn RequestContext,
            &mut dyn ResponseSink,
            &(dyn std::error::Error + Send + Sync + 'static),
        ) -> ExceptionMapping
        + Send
        + Sync,
{
    fn map_exception(
        &self,
        bound: &BoundInvocation,
        request: &dyn RequestContext,
        response: &mut dyn ResponseSink,
        error: &(dyn std::error::Error + Send + Sync + 'static),
    ) -> ExceptionMapping {
        self(bound, request, response, error)
    }
}

/// Custom precondition evaluated after required headers and params.
pub trait ExecutionFilter: Send + Sync {
    fn can_execute(&self, request: &dyn RequestContext) -> bool;
}

impl<F> ExecutionFilter for F
where
    F: Fn(&dyn RequestContext) -> bool + Send + Sync,
{
    fn can_execute(&self, request: &dyn RequestContext) -> bool {
        self(request)
    }
}

/// Immutable route definition.
pub struct RouteDescriptor {
    key: String,
    template: PathTemplate,
    factory: Arc<dyn HandlerFactory>,
    required_headers: IndexSet<String>,
    required_params: IndexSet<String>,
    allowed_mime_types: IndexSet<String>,
    exception_mapper: Option<Arc<dyn ExceptionMapper>>,
    execution_filter: Option<Arc<dyn ExecutionFilter>>,
}

impl RouteDescriptor {
    /// Start building a descriptor for `template`.
    pub fn builder<F: HandlerFactory + 'static>(
        template: PathTemplate,
        factory: F,
    ) -> RouteDescriptorBuilder {
        RouteDescriptorBuilder::new(template, Arc::new(factory))
    }

    /// `"METHOD /template"`, used as the statistics and metrics label.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn method(&self) -> HttpMethod {
        self.template.method()
    }

    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    /// Ask the factory for a handler instance.
    pub fn create_handler(&self) -> Option<Arc<dyn Handler>> {
        self.factory.create()
    }

    pub fn required_headers(&self) -> Vec<String> {
        self.required_headers.iter().cloned().collect()
    }

    pub fn required_params(&self) -> Vec<String> {
        self.required_params.iter().cloned().collect()
    }

    pub fn allowed_mime_types(&self) -> Vec<String> {
        self.allowed_mime_types.iter().cloned().collect()
    }

    pub fn exception_mapper(&self) -> Option<&dyn ExceptionMapper> {
        self.exception_mapper.as_deref()
    }

    pub fn execution_filter(&self) -> Option<&dyn ExecutionFilter> {
        self.execution_filter.as_deref()
    }

    pub(crate) fn required_header_names(&self) -> impl Iterator<Item = &str> {
        self.required_headers.iter().map(String::as_str)
    }

    pub(crate) fn required_param_names(&self) -> impl Iterator<Item = &str> {
        self.required_params.iter().map(String::as_str)
    }

    pub(crate) fn accepts_mime_type(&self, mime_type: &str) -> bool {
        self.allowed_mime_types.is_empty()
            || self.allowed_mime_types.contains(mime_type)
            || self
                .allowed_mime_types
                .contains(mime_type.to_ascii_lowercase().as_str())
    }
}

impl fmt::Debug for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("key", &self.key)
            .field("required_headers", &self.required_headers)
            .field("required_params", &self.required_params)
            .field("allowed_mime_types", &self.allowed_mime_types)
            .field("exception_mapper", &self.exception_mapper.is_some())
            .field("execution_filter", &self.execution_filter.is_some())
            .finish()
    }
}

/// Builder for [`RouteDescriptor`].
pub struct RouteDescriptorBuilder {
    template: PathTemplate,
    factory: Arc<dyn HandlerFactory>,
    required_headers: IndexSet<String>,
    required_params: IndexSet<String>,
    allowed_mime_types: IndexSet<String>,
    exception_mapper: Option<Arc<dyn ExceptionMapper>>,
    execution_filter: Option<Arc<dyn ExecutionFilter>>,
}

impl RouteDescriptorBuilder {
    /// Builder over an already shared factory.
    pub fn new(template: PathTemplate, factory: Arc<dyn HandlerFactory>) -> Self {
        Self {
            template,
            factory,
            required_headers: IndexSet::new(),
            required_params: IndexSet::new(),
            allowed_mime_types: IndexSet::new(),
            exception_mapper: None,
            execution_filter: None,
        }
    }

    /// Require an HTTP header. Empty names are ignored.
    pub fn required_header(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.is_empty() {
            self.required_headers.insert(name);
        }
        self
    }

    pub fn required_headers<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().fold(self, |b, n| b.required_header(n))
    }

    /// Require a request parameter. Empty names are ignored.
    pub fn required_param(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.is_empty() {
            self.required_params.insert(name);
        }
        self
    }

    pub fn required_params<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().fold(self, |b, n| b.required_param(n))
    }

    /// Restrict accepted request Content-Types. No entries means any type.
    pub fn allowed_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        if !mime_type.is_empty() {
            self.allowed_mime_types.insert(mime_type);
        }
        self
    }

    pub fn exception_mapper<M: ExceptionMapper + 'static>(self, mapper: M) -> Self {
        self.shared_exception_mapper(Arc::new(mapper))
    }

    pub fn shared_exception_mapper(mut self, mapper: Arc<dyn ExceptionMapper>) -> Self {
        self.exception_mapper = Some(mapper);
        self
    }

    pub fn execution_filter<X: ExecutionFilter + 'static>(mut self, filter: X) -> Self {
        self.execution_filter = Some(Arc::new(filter));
        self
    }

    /// Freeze the descriptor.
    pub fn build(self) -> RouteDescriptor {
        RouteDescriptor {
            key: format!("{} {}", self.template.method(), self.template),
            template: self.template,
            factory: self.factory,
            required_headers: self.required_headers,
            required_params: self.required_params,
            allowed_mime_types: self.allowed_mime_types,
            exception_mapper: self.exception_mapper,
            execution_filter: self.execution_filter,
        }
    }
}
