//! Invocation subsystem.
//!
//! # Data Flow
//! ```text
//! BoundInvocation (from routing)
//!     → pipeline.rs (lifecycle: callbacks, mapper, timing)
//!         reads → context.rs → callbacks.rs (lists + threshold)
//!         writes → context.rs → statistics.rs (per-route counters)
//!     → Ok(()) or InvocationError
//! ```
//!
//! # Design Decisions
//! - One `InvocationContext` per pipeline; tests build isolated ones
//! - A lazily created global context for hosts that want a singleton

pub mod callbacks;
pub mod context;
pub mod pipeline;
pub mod statistics;

pub use callbacks::{CallbackId, CallbackRegistry, DEFAULT_LONG_RUNNING_LIMIT_MS};
pub use context::InvocationContext;
pub use pipeline::ExecutionPipeline;
pub use statistics::{InvocationStatistics, PathSnapshot, StatisticsSnapshot};
