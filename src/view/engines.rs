//! Template engine registry and selection.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::config::{EngineConfig, Options};
use crate::error::{DispatchError, DispatchResult};
use crate::repository::Repository;
use crate::routing::View;
use crate::view::{HandlebarsRenderer, JinjaRenderer, MarkdownRenderer, ViewRenderer};

/// Builds a renderer from its configured name and options.
pub type EngineFactory =
    Arc<dyn Fn(&str, &Options) -> DispatchResult<Arc<dyn ViewRenderer>> + Send + Sync>;

/// Builtin engine factories keyed by engine id.
pub fn default_factories() -> HashMap<String, EngineFactory> {
    let mut factories: HashMap<String, EngineFactory> = HashMap::new();
    factories.insert(
        "jinja".to_string(),
        Arc::new(
            |name: &str, options: &Options| -> DispatchResult<Arc<dyn ViewRenderer>> {
                Ok(Arc::new(JinjaRenderer::from_options(name, options)))
            },
        ),
    );
    factories.insert(
        "handlebars".to_string(),
        Arc::new(
            |name: &str, options: &Options| -> DispatchResult<Arc<dyn ViewRenderer>> {
                Ok(Arc::new(HandlebarsRenderer::from_options(name, options)))
            },
        ),
    );
    factories.insert(
        "markdown".to_string(),
        Arc::new(
            |name: &str, options: &Options| -> DispatchResult<Arc<dyn ViewRenderer>> {
                Ok(Arc::new(MarkdownRenderer::from_options(name, options)))
            },
        ),
    );
    factories
}

/// Registered renderers, in registration order.
#[derive(Default)]
pub struct TemplateEngines {
    engines: Vec<Arc<dyn ViewRenderer>>,
    by_name: HashMap<String, Arc<dyn ViewRenderer>>,
    default: Option<Arc<dyn ViewRenderer>>,
}

impl TemplateEngines {
    pub fn new() -> Self {
        Self::default()
    }

    /// The builtin engines: jinja (default), handlebars and markdown.
    pub fn builtin() -> Self {
        let mut engines = Self::new();
        engines.register(Arc::new(JinjaRenderer::new("jinja")), true);
        engines.register(Arc::new(HandlebarsRenderer::new("handlebars")), false);
        engines.register(Arc::new(MarkdownRenderer::new("markdown")), false);
        engines
    }

    /// Build engines from configuration through the factory registry.
    ///
    /// Entries naming an unknown engine id, or whose factory fails, are skipped.
    /// Without any configured entries the builtin set is used.
    pub fn from_config(
        configs: &[EngineConfig],
        factories: &HashMap<String, EngineFactory>,
    ) -> Self {
        if configs.is_empty() {
            return Self::builtin();
        }

        let mut engines = Self::new();
        for config in configs {
            let Some(factory) = factories.get(&config.engine) else {
                tracing::warn!(
                    name = %config.name,
                    engine = %config.engine,
                    "Unknown template engine, skipping"
                );
                continue;
            };
            match factory(&config.name, &config.options) {
                Ok(renderer) => engines.register(renderer, config.default),
                Err(e) => tracing::warn!(
                    name = %config.name,
                    error = %e,
                    "Template engine failed to initialize, skipping"
                ),
            }
        }
        engines
    }

    /// Register a renderer under its name. The first registered renderer is
    /// the default unless a later one is marked default.
    pub fn register(&mut self, renderer: Arc<dyn ViewRenderer>, default: bool) {
        if default || self.default.is_none() {
            self.default = Some(renderer.clone());
        }
        self.by_name
            .insert(renderer.name().to_string(), renderer.clone());
        self.engines.push(renderer);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ViewRenderer>> {
        self.by_name.get(name)
    }

    pub fn default_engine(&self) -> Option<&Arc<dyn ViewRenderer>> {
        self.default.as_ref()
    }

    pub fn names(&self) -> Vec<&str> {
        self.engines.iter().map(|e| e.name()).collect()
    }

    /// Pick the renderer for a template.
    ///
    /// Precedence: view engine, repository engine, an engine claiming the
    /// file extension, then the default.
    pub fn select(
        &self,
        view: Option<&View>,
        repository: &Repository,
        path: &str,
    ) -> DispatchResult<Arc<dyn ViewRenderer>> {
        let named = view
            .and_then(|v| v.engine.as_deref())
            .or_else(|| repository.engine());
        if let Some(name) = named {
            return self
                .get(name)
                .cloned()
                .ok_or_else(|| DispatchError::failure(format!("unknown template engine: {name}")));
        }

        if let Some(ext) = Path::new(path).extension().and_then(|e| e.to_str()) {
            if let Some(engine) = self
                .engines
                .iter()
                .find(|e| e.extensions().iter().any(|x| x.eq_ignore_ascii_case(ext)))
            {
                return Ok(engine.clone());
            }
        }

        self.default
            .clone()
            .ok_or_else(|| DispatchError::failure("no template engine configured"))
    }
}
