//! Routes and views.

use axum::http::Method;

use crate::config::{ControllerRef, RouteConfig, ViewConfig};
use crate::routing::pattern::{PathPattern, PatternError};

/// What to render for a request and which controllers to run around it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct View {
    /// Template name. `None` means path-based lookup in the repository.
    pub template: Option<String>,
    /// Repository holding the template. `None` means the default repository.
    pub repository: Option<String>,
    /// Engine override.
    pub engine: Option<String>,
    /// Run in order before rendering.
    pub controllers: Vec<ControllerRef>,
    /// Run as soon as the view is selected.
    pub before: Vec<ControllerRef>,
    /// Run after rendering.
    pub after: Vec<ControllerRef>,
}

impl View {
    pub fn from_config(config: &ViewConfig) -> Self {
        Self {
            template: config.template.clone().filter(|t| !t.is_empty()),
            repository: config.repository.clone().filter(|r| !r.is_empty()),
            engine: config.engine.clone().filter(|e| !e.is_empty()),
            controllers: config.controllers.clone(),
            before: config.before.clone(),
            after: config.after.clone(),
        }
    }

    /// A view that renders a fixed template.
    pub fn template(template: impl Into<String>) -> Self {
        Self {
            template: Some(template.into()),
            ..Self::default()
        }
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    pub fn with_controller(mut self, controller: ControllerRef) -> Self {
        self.controllers.push(controller);
        self
    }
}

/// A compiled route. Immutable once built.
#[derive(Debug, Clone)]
pub struct Route {
    name: String,
    pattern: PathPattern,
    methods: Vec<String>,
    view: View,
}

impl Route {
    /// Build a route from a pattern and view. Empty `methods` matches any method.
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        methods: &str,
        view: View,
    ) -> Result<Self, PatternError> {
        Ok(Self {
            name: name.into(),
            pattern: PathPattern::parse(pattern)?,
            methods: parse_methods(methods),
            view,
        })
    }

    /// Build a route from its configuration. Unnamed routes are named by their path.
    pub fn from_config(config: &RouteConfig) -> Result<Self, PatternError> {
        let name = config
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| config.path.clone());
        Self::new(
            name,
            &config.path,
            &config.method,
            View::from_config(&config.view),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    /// Uppercase method names; empty means any method.
    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn allows(&self, method: &Method) -> bool {
        self.methods.is_empty() || self.methods.iter().any(|m| m == method.as_str())
    }

    /// Match method and path, returning extracted variables.
    pub fn matches(&self, method: &Method, path: &str) -> Option<Vec<(String, String)>> {
        if !self.allows(method) {
            return None;
        }
        self.pattern.captures(path)
    }
}

fn parse_methods(methods: &str) -> Vec<String> {
    methods
        .split(',')
        .map(|m| m.trim().to_ascii_uppercase())
        .filter(|m| !m.is_empty())
        .collect()
}
