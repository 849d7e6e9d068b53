//! Native controller registry and builtin controllers.
//!
//! # Responsibilities
//! - Map controller ids to factories registered at startup
//! - Keep one instance per id for plain (option-less) resolution
//! - Provide the `builtin.*` controllers
//!
//! # Design Decisions
//! - Factories receive registration-time options; execution-time options
//!   are passed to `execute` separately
//! - Builtins are registered by `NativeRegistry::new` and can be replaced

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::StatusCode;
use dashmap::DashMap;
use serde_json::Value;

use crate::config::Options;
use crate::context::RequestContext;
use crate::controller::Controller;
use crate::error::{DispatchError, DispatchResult};

/// Builds a controller from registration-time options.
pub type NativeFactory = Arc<dyn Fn(&Options) -> DispatchResult<Arc<dyn Controller>> + Send + Sync>;

/// Registry of natively implemented controllers.
pub struct NativeRegistry {
    factories: HashMap<String, NativeFactory>,
    instances: DashMap<String, Arc<dyn Controller>>,
}

impl NativeRegistry {
    /// A registry holding the builtin controllers.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_controller("builtin.assign", Arc::new(AssignController));
        registry.register_controller("builtin.redirect", Arc::new(RedirectController));
        registry.register_controller("builtin.halt", Arc::new(HaltController));
        registry
    }

    /// A registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
            instances: DashMap::new(),
        }
    }

    /// Register a factory under `id`, replacing any previous one.
    pub fn register(&mut self, id: impl Into<String>, factory: NativeFactory) {
        let id = id.into();
        self.instances.remove(&id);
        self.factories.insert(id, factory);
    }

    /// Register a ready-made controller under `id`.
    pub fn register_controller(&mut self, id: impl Into<String>, controller: Arc<dyn Controller>) {
        self.register(
            id,
            Arc::new(move |_: &Options| -> DispatchResult<Arc<dyn Controller>> {
                Ok(controller.clone())
            }),
        );
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Shared instance for `id`, built on first use. `None` if not registered.
    pub fn instantiate(&self, id: &str) -> Option<DispatchResult<Arc<dyn Controller>>> {
        if let Some(instance) = self.instances.get(id) {
            return Some(Ok(instance.clone()));
        }
        let factory = self.factories.get(id)?;
        Some(factory(&Options::new()).map(|controller| {
            self.instances
                .entry(id.to_string())
                .or_insert(controller)
                .clone()
        }))
    }

    /// A fresh instance for `id` built with `options`. Never cached.
    pub fn build(&self, id: &str, options: &Options) -> Option<DispatchResult<Arc<dyn Controller>>> {
        self.factories.get(id).map(|factory| factory(options))
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.factories.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for NativeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Copies its options into the context data.
pub struct AssignController;

impl Controller for AssignController {
    fn execute(&self, ctx: &mut RequestContext, options: &Options) -> DispatchResult<()> {
        for (key, value) in options {
            ctx.put(key.clone(), value.clone());
        }
        Ok(())
    }
}

/// Redirects to `location` with `status` (default 302) and halts.
pub struct RedirectController;

impl Controller for RedirectController {
    fn execute(&self, ctx: &mut RequestContext, options: &Options) -> DispatchResult<()> {
        let location = options
            .get("location")
            .and_then(Value::as_str)
            .ok_or_else(|| DispatchError::failure("builtin.redirect requires a location"))?;
        let status = status_option(options)
            .filter(StatusCode::is_redirection)
            .unwrap_or(StatusCode::FOUND);
        ctx.redirect(location, status);
        Ok(())
    }
}

/// Answers immediately with `status`, `body` and `content_type`, then halts.
pub struct HaltController;

impl Controller for HaltController {
    fn execute(&self, ctx: &mut RequestContext, options: &Options) -> DispatchResult<()> {
        if let Some(status) = status_option(options) {
            ctx.response_mut().status = status;
        }
        if let Some(body) = options.get("body").and_then(Value::as_str) {
            let content_type = options
                .get("content_type")
                .and_then(Value::as_str)
                .unwrap_or("text/plain; charset=utf-8");
            ctx.response_mut().set_text(content_type, body.to_string());
        }
        ctx.halt();
        Ok(())
    }
}

fn status_option(options: &Options) -> Option<StatusCode> {
    options
        .get("status")
        .and_then(Value::as_u64)
        .and_then(|s| u16::try_from(s).ok())
        .and_then(|s| StatusCode::from_u16(s).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::http::Request;
    use crate::site::Site;
    use serde_json::json;

    fn context() -> RequestContext {
        let site = Site::builder(SiteConfig::default()).build().unwrap();
        RequestContext::new(Arc::new(site), Request::get("/"))
    }

    fn options(value: Value) -> Options {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_instances_are_shared() {
        let registry = NativeRegistry::new();
        let a = registry.instantiate("builtin.assign").unwrap().unwrap();
        let b = registry.instantiate("builtin.assign").unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(registry.instantiate("missing").is_none());
    }

    #[test]
    fn test_assign() {
        let mut ctx = context();
        AssignController
            .execute(&mut ctx, &options(json!({"title": "Home", "n": 2})))
            .unwrap();
        assert_eq!(ctx.get("title"), Some(&json!("Home")));
        assert_eq!(ctx.get("n"), Some(&json!(2)));
    }

    #[test]
    fn test_redirect() {
        let mut ctx = context();
        RedirectController
            .execute(&mut ctx, &options(json!({"location": "/new", "status": 301})))
            .unwrap();
        assert!(ctx.is_halted());
        assert_eq!(ctx.response().status, StatusCode::MOVED_PERMANENTLY);
        assert_eq!(ctx.response().header("location"), Some("/new"));

        let mut ctx = context();
        let err = RedirectController.execute(&mut ctx, &Options::new()).unwrap_err();
        assert!(!err.is_typed());
    }

    #[test]
    fn test_halt() {
        let mut ctx = context();
        HaltController
            .execute(&mut ctx, &options(json!({"status": 403, "body": "no"})))
            .unwrap();
        assert!(ctx.is_halted());
        assert_eq!(ctx.response().status, StatusCode::FORBIDDEN);
        assert_eq!(ctx.response().body.as_text(), "no");
    }
}
