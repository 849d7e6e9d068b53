//! Per-request context.
//!
//! # Responsibilities
//! - Hold the request, the response under construction and the halt flag
//! - Carry route parameters and arbitrary controller data through a dispatch
//! - Export itself to templates and scripts, and absorb script mutations
//!
//! # Design Decisions
//! - Created once per request, owned by that request's worker, never reused
//! - Holds an `Arc<Site>` instead of reaching for global state
//! - Halt is sticky: nothing can clear it once set

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{json, Map, Value};

use crate::http::{Request, Response};
use crate::site::Site;

/// Mutable state shared by every filter, controller and renderer of one request.
pub struct RequestContext {
    site: Arc<Site>,
    request: Request,
    response: Response,
    path: String,
    params: HashMap<String, String>,
    data: Map<String, Value>,
    route: Option<String>,
    halted: bool,
}

impl RequestContext {
    /// Create the context for a request.
    pub fn new(site: Arc<Site>, request: Request) -> Self {
        let path = normalize_path(&request.path);
        let params = request.params.clone();
        Self {
            site,
            request,
            response: Response::default(),
            path,
            params,
            data: Map::new(),
            route: None,
            halted: false,
        }
    }

    pub fn site(&self) -> &Arc<Site> {
        &self.site
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Take the response out, leaving a default one behind.
    pub fn take_response(&mut self) -> Response {
        std::mem::take(&mut self.response)
    }

    /// Resolved request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path(&mut self, path: &str) {
        self.path = normalize_path(path);
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Merge parameters; a later writer for a key wins.
    pub fn merge_params<I>(&mut self, params: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.params.extend(params);
    }

    /// Name of the matched route, if any.
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    pub(crate) fn set_route(&mut self, name: Option<String>) {
        self.route = name;
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    /// Stop the pipeline after the current step.
    pub fn halt(&mut self) {
        self.halted = true;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Answer with a redirect and halt.
    pub fn redirect(&mut self, location: &str, status: StatusCode) {
        self.response = Response::redirect(location, status);
        self.halt();
    }

    /// Data context handed to template engines.
    pub fn template_data(&self) -> Value {
        let mut root = Map::new();
        root.insert(
            "request".to_string(),
            json!({
                "method": self.request.method.as_str(),
                "path": self.path,
                "headers": self.header_map(),
                "id": self.request.request_id(),
            }),
        );
        root.insert("params".to_string(), json!(self.params));
        root.insert("route".to_string(), json!(self.route));
        for (key, value) in &self.data {
            root.insert(key.clone(), value.clone());
        }
        Value::Object(root)
    }

    /// Snapshot bound into a script as `context`.
    pub fn script_bindings(&self) -> Value {
        json!({
            "path": self.path,
            "method": self.request.method.as_str(),
            "params": self.params,
            "headers": self.header_map(),
            "data": self.data,
            "halt": self.halted,
            "response": {
                "status": self.response.status.as_u16(),
                "content_type": self.response.content_type,
                "body": Value::Null,
                "redirect": Value::Null,
            },
        })
    }

    /// Apply a script's mutated `context` binding back onto this context.
    pub fn absorb_script_bindings(&mut self, bindings: &Value) {
        let Some(bindings) = bindings.as_object() else {
            tracing::warn!("Script replaced its context with a non-map value, ignoring");
            return;
        };

        if let Some(Value::Object(data)) = bindings.get("data") {
            self.data = data.clone();
        }
        if let Some(Value::Object(params)) = bindings.get("params") {
            self.params = params
                .iter()
                .map(|(k, v)| (k.clone(), value_to_param(v)))
                .collect();
        }

        if let Some(Value::Object(response)) = bindings.get("response") {
            if let Some(status) = response
                .get("status")
                .and_then(Value::as_u64)
                .and_then(|s| u16::try_from(s).ok())
                .and_then(|s| StatusCode::from_u16(s).ok())
            {
                self.response.status = status;
            }
            if let Some(content_type) = response.get("content_type").and_then(Value::as_str) {
                self.response.content_type = Some(content_type.to_string());
            }
            if let Some(body) = response.get("body").and_then(Value::as_str) {
                self.response.body = crate::http::Body::Text(body.to_string());
            }
            if let Some(Value::Object(headers)) = response.get("headers") {
                for (name, value) in headers {
                    if let Some(value) = value.as_str() {
                        self.response.set_header(name, value);
                    }
                }
            }
            if let Some(location) = response.get("redirect").and_then(Value::as_str) {
                let status = self.response.status;
                let status = if status.is_redirection() {
                    status
                } else {
                    StatusCode::FOUND
                };
                self.redirect(location, status);
            }
        }

        if bindings.get("halt").and_then(Value::as_bool) == Some(true) {
            self.halt();
        }
    }

    fn header_map(&self) -> Map<String, Value> {
        self.request
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), Value::String(v.to_string())))
            })
            .collect()
    }
}

fn value_to_param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Collapse duplicate slashes and ensure a leading slash.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 1);
    normalized.push('/');
    let mut segments = path.split('/').filter(|s| !s.is_empty()).peekable();
    while let Some(segment) = segments.next() {
        normalized.push_str(segment);
        if segments.peek().is_some() {
            normalized.push('/');
        }
    }
    if path.len() > 1 && path.ends_with('/') && !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;

    fn context(request: Request) -> RequestContext {
        let site = Site::builder(SiteConfig::default()).build().unwrap();
        RequestContext::new(Arc::new(site), request)
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("//docs//intro"), "/docs/intro");
        assert_eq!(normalize_path("docs/"), "/docs/");
    }

    #[test]
    fn test_data_and_halt() {
        let mut ctx = context(Request::get("/"));
        ctx.put("title", "Home");
        assert_eq!(ctx.get("title"), Some(&Value::from("Home")));
        assert!(!ctx.is_halted());
        ctx.halt();
        assert!(ctx.is_halted());
        assert_eq!(ctx.remove("title"), Some(Value::from("Home")));
    }

    #[test]
    fn test_template_data_includes_params_and_data() {
        let mut ctx = context(Request::get("/a").with_param("q", "x"));
        ctx.put("title", "A");
        let data = ctx.template_data();
        assert_eq!(data["params"]["q"], "x");
        assert_eq!(data["title"], "A");
        assert_eq!(data["request"]["path"], "/a");
    }

    #[test]
    fn test_absorb_script_bindings() {
        let mut ctx = context(Request::get("/a"));
        let mut bindings = ctx.script_bindings();
        bindings["data"]["user"] = json!("ada");
        bindings["params"]["page"] = json!(3);
        bindings["response"]["status"] = json!(201);
        bindings["response"]["body"] = json!("made");
        bindings["halt"] = json!(true);

        ctx.absorb_script_bindings(&bindings);
        assert_eq!(ctx.get("user"), Some(&json!("ada")));
        assert_eq!(ctx.param("page"), Some("3"));
        assert_eq!(ctx.response().status, StatusCode::CREATED);
        assert_eq!(ctx.response().body.as_text(), "made");
        assert!(ctx.is_halted());
    }

    #[test]
    fn test_script_redirect() {
        let mut ctx = context(Request::get("/a"));
        let mut bindings = ctx.script_bindings();
        bindings["response"]["redirect"] = json!("/login");

        ctx.absorb_script_bindings(&bindings);
        assert_eq!(ctx.response().status, StatusCode::FOUND);
        assert_eq!(ctx.response().header("location"), Some("/login"));
        assert!(ctx.is_halted());
    }
}
