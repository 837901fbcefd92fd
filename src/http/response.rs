//! Response capability written to by handlers and exception mappers.
//!
//! # Responsibilities
//! - Define the `ResponseSink` contract
//! - Buffer a response in memory until the host turns it into an axum response
//!
//! # Design Decisions
//! - Status defaults to 200 when a handler never sets one
//! - `reset` discards everything so an exception mapper starts from a clean slate

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

/// Write side of a request, as seen by the engine.
pub trait ResponseSink: Send {
    fn set_status(&mut self, code: u16);

    fn set_header(&mut self, name: &str, value: &str);

    /// Append bytes to the response body.
    fn write_body(&mut self, bytes: &[u8]);

    /// Drop status, headers and body written so far.
    fn reset(&mut self);
}

/// In-memory response sink.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseBuffer {
    status: Option<u16>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status set by the handler, if any.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body as UTF-8, lossily.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// True if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.headers.is_empty() && self.body.is_empty()
    }
}

impl ResponseSink for ResponseBuffer {
    fn set_status(&mut self, code: u16) {
        self.status = Some(code);
    }

    fn set_header(&mut self, name: &str, value: &str) {
        if let Some(slot) = self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            slot.1 = value.to_string();
        } else {
            self.headers.push((name.to_string(), value.to_string()));
        }
    }

    fn write_body(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    fn reset(&mut self) {
        self.status = None;
        self.headers.clear();
        self.body.clear();
    }
}

impl IntoResponse for ResponseBuffer {
    fn into_response(self) -> Response {
        let status = self
            .status
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::OK);

        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;

        let headers = response.headers_mut();
        for (name, value) in self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(n), Ok(v)) => {
                    headers.insert(n, v);
                }
                _ => tracing::warn!(header = %name, "Dropping invalid response header"),
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_overwrites_headers() {
        let mut buf = ResponseBuffer::new();
        buf.set_header("Content-Type", "text/plain");
        buf.set_header("content-type", "application/json");
        assert_eq!(buf.header("CONTENT-TYPE"), Some("application/json"));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut buf = ResponseBuffer::new();
        buf.set_status(201);
        buf.write_body(b"partial");
        buf.reset();
        assert!(buf.is_empty());
    }

    #[test]
    fn test_into_response_defaults_to_ok() {
        let mut buf = ResponseBuffer::new();
        buf.write_body(b"hi");
        let response = buf.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let mut buf = ResponseBuffer::new();
        buf.set_status(418);
        assert_eq!(buf.into_response().status(), StatusCode::IM_A_TEAPOT);
    }
}
