//! HTTP host adapter.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace span)
//!     → request.rs (method, path, headers, query, body → HttpRequestContext)
//!     → [routing resolves, preconditions checked]
//!     → [invoker runs the pipeline on a blocking thread]
//!     → response.rs (ResponseBuffer → axum Response)
//!     → Send to client
//! ```
//!
//! The routing core only sees `RequestContext` and `ResponseSink`; nothing
//! outside this module touches axum types.

pub mod method;
pub mod request;
pub mod response;
pub mod server;

pub use method::{HttpMethod, UnsupportedMethod};
pub use request::{HttpRequestContext, RequestContext};
pub use response::{ResponseBuffer, ResponseSink};
pub use server::{ApiServer, AppState};
