//! Request capability consumed by the routing core.
//!
//! # Responsibilities
//! - Define the `RequestContext` contract handlers and preconditions read from
//! - Provide `HttpRequestContext`, an owned implementation built from axum parts
//! - Extract query parameters so `has_parameter` works without the core parsing URLs
//!
//! # Design Decisions
//! - Header lookup is case-insensitive
//! - The first value wins for repeated headers and parameters
//! - A bare `?flag` counts as a present parameter with an empty value

use axum::body::Bytes;
use axum::extract::Query;
use axum::http::request::Parts;

use crate::http::method::{HttpMethod, UnsupportedMethod};

/// Read-only view of an incoming request.
pub trait RequestContext: Send + Sync {
    /// First value of the named header, if present.
    fn header(&self, name: &str) -> Option<&str>;

    /// First value of the named request parameter, if present.
    fn parameter(&self, name: &str) -> Option<&str>;

    /// Request path, relative to wherever the host mounted the engine.
    fn path(&self) -> &str;

    fn method(&self) -> HttpMethod;

    fn has_parameter(&self, name: &str) -> bool {
        self.parameter(name).is_some()
    }

    fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Raw request body. Empty unless the host buffered one.
    fn body(&self) -> &[u8] {
        &[]
    }
}

/// Owned request snapshot handed to the engine by the HTTP host.
#[derive(Debug, Clone)]
pub struct HttpRequestContext {
    method: HttpMethod,
    path: String,
    headers: Vec<(String, String)>,
    params: Vec<(String, String)>,
    body: Bytes,
}

impl HttpRequestContext {
    /// Create an empty request for the given method and path.
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            params: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Build a context from axum request parts and an already buffered body.
    ///
    /// Header bytes outside visible ASCII are kept, decoded lossily as UTF-8.
    pub fn from_parts(parts: &Parts, body: Bytes) -> Result<Self, UnsupportedMethod> {
        let method = HttpMethod::try_from(&parts.method)?;

        let headers = parts
            .headers
            .iter()
            .map(|(name, value)| {
                let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
                (name.as_str().to_string(), value)
            })
            .collect();

        let params = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map(|Query(pairs)| pairs)
            .unwrap_or_default();

        Ok(Self {
            method,
            path: parts.uri.path().to_string(),
            headers,
            params,
            body,
        })
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }
}

impl RequestContext for HttpRequestContext {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn parameter(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn method(&self) -> HttpMethod {
        self.method
    }

    fn body(&self) -> &[u8] {
        &self.body
    }
}
