//! Abstract outbound response.
//!
//! # Responsibilities
//! - Accumulate status, headers, content type and body during a dispatch
//! - Convert into an axum response at the adapter boundary
//!
//! # Design Decisions
//! - Body is either text, raw bytes, or empty; streaming is left to the adapter
//! - Content-Length is derived from the body on conversion, never stored

use axum::body::{Body as AxumBody, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response as AxumResponse};

/// Response body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Body {
    #[default]
    Empty,
    Text(String),
    Bytes(Bytes),
}

impl Body {
    pub fn len(&self) -> usize {
        match self {
            Body::Empty => 0,
            Body::Text(text) => text.len(),
            Body::Bytes(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Body as text, lossily decoding bytes.
    pub fn as_text(&self) -> std::borrow::Cow<'_, str> {
        match self {
            Body::Empty => std::borrow::Cow::Borrowed(""),
            Body::Text(text) => std::borrow::Cow::Borrowed(text),
            Body::Bytes(bytes) => String::from_utf8_lossy(bytes),
        }
    }
}

/// Response built up by filters, controllers and renderers.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub content_type: Option<String>,
    pub body: Body,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            content_type: None,
            body: Body::Empty,
        }
    }
}

impl Response {
    /// An empty response with the given status.
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// A redirect to `location`.
    pub fn redirect(location: &str, status: StatusCode) -> Self {
        let mut response = Self::empty(status);
        response.set_header(header::LOCATION.as_str(), location);
        response
    }

    /// Set a text body and content type.
    pub fn set_text(&mut self, content_type: impl Into<String>, text: String) {
        self.content_type = Some(content_type.into());
        self.body = Body::Text(text);
    }

    /// Set a byte body and content type.
    pub fn set_bytes(&mut self, content_type: impl Into<String>, bytes: Bytes) {
        self.content_type = Some(content_type.into());
        self.body = Body::Bytes(bytes);
    }

    /// Set a header, ignoring names or values that are not valid HTTP.
    pub fn set_header(&mut self, name: &str, value: &str) -> bool {
        match (
            header::HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
                true
            }
            _ => {
                tracing::warn!(header = %name, "Ignoring invalid response header");
                false
            }
        }
    }

    /// Header value as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> AxumResponse {
        let length = self.body.len();
        let body = match self.body {
            Body::Empty => AxumBody::empty(),
            Body::Text(text) => AxumBody::from(text),
            Body::Bytes(bytes) => AxumBody::from(bytes),
        };

        let mut response = AxumResponse::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;

        let headers = response.headers_mut();
        if let Some(content_type) = self.content_type {
            if let Ok(value) = HeaderValue::from_str(&content_type) {
                headers.insert(header::CONTENT_TYPE, value);
            }
        }
        if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
            headers.insert(header::CONTENT_LENGTH, value);
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_sets_location() {
        let response = Response::redirect("/login", StatusCode::FOUND);
        assert_eq!(response.status, StatusCode::FOUND);
        assert_eq!(response.header("location"), Some("/login"));
        assert!(response.body.is_empty());
    }

    #[test]
    fn test_invalid_header_ignored() {
        let mut response = Response::default();
        assert!(!response.set_header("bad header", "x"));
        assert!(response.set_header("x-custom", "1"));
        assert_eq!(response.header("x-custom"), Some("1"));
    }

    #[test]
    fn test_into_axum_response() {
        let mut response = Response::default();
        response.set_text("text/html; charset=utf-8", "<p>hi</p>".to_string());
        let converted = response.into_response();

        assert_eq!(converted.status(), StatusCode::OK);
        assert_eq!(
            converted.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
        assert_eq!(converted.headers()[header::CONTENT_LENGTH], "9");
    }
}
