//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Registration (at wiring time):
//!     (method, "/orders/{id}") → template.rs (compile segments)
//!     → descriptor.rs (attach factory, preconditions, mapper)
//!     → router.rs (append under write lock)
//!
//! Incoming Request (method, path):
//!     → matcher.rs (normalize path into segments)
//!     → router.rs (collect matching routes under read lock)
//!     → ambiguity.rs (only if more than one matched)
//!     → Return: BoundInvocation or NotFound
//! ```
//!
//! # Design Decisions
//! - Templates compiled once, descriptors immutable once built
//! - Literal segments compare by equality; regex runs only for constrained variables
//! - Deterministic: same input always yields same variables
//! - Ambiguity refuses to dispatch by default

pub mod ambiguity;
pub mod descriptor;
pub mod invocation;
pub mod matcher;
pub mod router;
pub mod template;

pub use ambiguity::{AmbiguityResolver, FirstRegistered, RefuseAmbiguous};
pub use descriptor::{
    handler_fn, ConstantFactory, ExceptionMapper, ExceptionMapping, ExecutionFilter, Handler,
    HandlerFactory, RouteDescriptor, RouteDescriptorBuilder, SupplierFactory, TransientFactory,
};
pub use invocation::{BoundInvocation, PreconditionFailure};
pub use matcher::{ConstraintError, PathSegmentSpec, VariableConstraint};
pub use router::RouteRegistry;
pub use template::{InvalidPathTemplateError, PathTemplate, PathVariables};
