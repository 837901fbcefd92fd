//! Route invoker library
//!
//! Maps (method, path) pairs onto registered handlers through path templates
//! like `/orders/{orderId}/items/{itemId}`, checks per-route preconditions and
//! runs each call through a callback and statistics pipeline.

pub mod admin;
pub mod config;
pub mod error;
pub mod http;
pub mod invoker;
pub mod observability;
pub mod routing;

pub use config::schema::InvokerConfig;
pub use error::{BoxError, ConfigurationError, InvocationError};
pub use http::{ApiServer, HttpMethod, RequestContext, ResponseSink};
pub use invoker::{ExecutionPipeline, InvocationContext};
pub use routing::{BoundInvocation, RouteDescriptor, RouteRegistry};
