//! Abstract inbound request.
//!
//! # Responsibilities
//! - Carry method, path, headers, parameters and body into the core
//! - Parse query-string and urlencoded form parameters
//!
//! # Design Decisions
//! - Independent of the HTTP server; the adapter builds it from an axum request
//! - Parameters are a flat string map; a later value for a key wins

use std::collections::HashMap;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, Method};

/// Header used to correlate a request across logs.
pub const X_REQUEST_ID: &str = "x-request-id";

/// An inbound request as seen by the dispatcher.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub params: HashMap<String, String>,
    pub body: Bytes,
}

impl Request {
    /// Create a request with no headers, parameters or body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            params: HashMap::new(),
            body: Bytes::new(),
        }
    }

    /// Shorthand for a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Add a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Merge parameters from a query string (without the leading `?`).
    pub fn with_query(mut self, query: &str) -> Self {
        self.params.extend(parse_urlencoded(query.as_bytes()));
        self
    }

    /// Attach a body. Urlencoded form bodies are merged into the parameters.
    pub fn with_body(mut self, content_type: Option<&str>, body: Bytes) -> Self {
        if content_type
            .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false)
        {
            self.params.extend(parse_urlencoded(&body));
        }
        self.body = body;
        self
    }

    /// Header value as a string, if present and valid.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Request ID set by the adapter, if any.
    pub fn request_id(&self) -> Option<&str> {
        self.header(X_REQUEST_ID)
    }

    /// Content type of the request body.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

fn parse_urlencoded(input: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(input).into_owned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_parameters() {
        let req = Request::get("/search").with_query("q=rust+web&page=2&q=last");
        assert_eq!(req.params["q"], "last");
        assert_eq!(req.params["page"], "2");
    }

    #[test]
    fn test_form_body_merged_into_params() {
        let req = Request::new(Method::POST, "/login").with_body(
            Some("application/x-www-form-urlencoded; charset=utf-8"),
            Bytes::from_static(b"user=ada&remember=on"),
        );
        assert_eq!(req.params["user"], "ada");
        assert_eq!(req.body.len(), 20);
    }

    #[test]
    fn test_json_body_not_parsed_as_params() {
        let req = Request::new(Method::POST, "/api")
            .with_body(Some("application/json"), Bytes::from_static(b"{\"a\":1}"));
        assert!(req.params.is_empty());
    }
}
