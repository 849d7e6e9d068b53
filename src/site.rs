//! The site: every manager a dispatch needs, built once at startup.
//!
//! # Responsibilities
//! - Construct the cache, repository, controller, route, filter and engine
//!   managers from a `SiteConfig`
//! - Hand them to the dispatcher and to each `RequestContext` by reference
//!
//! # Design Decisions
//! - No global state: whatever a controller may reach is reachable from `Site`
//! - Native controllers, interpreters, cache kinds and engine factories are
//!   registered through `SiteBuilder` before anything is built from configuration

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::cache::{CacheFactory, CacheManager};
use crate::config::{validate_config, ConfigError, SiteConfig, SiteSettings, ValidationError};
use crate::controller::manager::SCRIPT_CACHE;
use crate::controller::rhai::RhaiInterpreter;
use crate::controller::{ControllerManager, Interpreter, NativeFactory, NativeRegistry};
use crate::error::DispatchError;
use crate::filter::FilterChain;
use crate::repository::RepositoryManager;
use crate::routing::RouteManager;
use crate::view::engines::default_factories;
use crate::view::{EngineFactory, TemplateEngines};

/// Failure to build a site.
#[derive(Debug, Error)]
pub enum SiteError {
    #[error("invalid configuration: {}", join(.0))]
    Invalid(Vec<ValidationError>),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("helper {name}: {source}")]
    Helper {
        name: String,
        #[source]
        source: DispatchError,
    },
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Site-wide managers shared by every request.
pub struct Site {
    settings: SiteSettings,
    caches: Arc<CacheManager>,
    repositories: RepositoryManager,
    controllers: ControllerManager,
    routes: Arc<RouteManager>,
    filters: FilterChain,
    engines: TemplateEngines,
}

impl Site {
    pub fn builder(config: SiteConfig) -> SiteBuilder {
        SiteBuilder::new(config)
    }

    pub fn settings(&self) -> &SiteSettings {
        &self.settings
    }

    pub fn caches(&self) -> &Arc<CacheManager> {
        &self.caches
    }

    pub fn repositories(&self) -> &RepositoryManager {
        &self.repositories
    }

    pub fn controllers(&self) -> &ControllerManager {
        &self.controllers
    }

    pub fn routes(&self) -> &Arc<RouteManager> {
        &self.routes
    }

    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    pub fn engines(&self) -> &TemplateEngines {
        &self.engines
    }
}

/// Collects registrations, then builds a `Site` from configuration.
pub struct SiteBuilder {
    config: SiteConfig,
    natives: NativeRegistry,
    interpreters: Vec<Arc<dyn Interpreter>>,
    cache_factories: Vec<(String, CacheFactory)>,
    engine_factories: HashMap<String, EngineFactory>,
}

impl SiteBuilder {
    fn new(config: SiteConfig) -> Self {
        Self {
            config,
            natives: NativeRegistry::new(),
            interpreters: vec![Arc::new(RhaiInterpreter::new())],
            cache_factories: Vec::new(),
            engine_factories: default_factories(),
        }
    }

    /// Register a native controller factory.
    pub fn native(mut self, id: impl Into<String>, factory: NativeFactory) -> Self {
        self.natives.register(id, factory);
        self
    }

    /// Register a script interpreter. Later registrations win per extension.
    pub fn interpreter(mut self, interpreter: Arc<dyn Interpreter>) -> Self {
        self.interpreters.push(interpreter);
        self
    }

    /// Register a cache factory for a `kind` used in `[caches.<name>]`.
    pub fn cache_factory(mut self, kind: impl Into<String>, factory: CacheFactory) -> Self {
        self.cache_factories.push((kind.into(), factory));
        self
    }

    /// Register a template engine factory under an engine id.
    pub fn engine_factory(mut self, id: impl Into<String>, factory: EngineFactory) -> Self {
        self.engine_factories.insert(id.into(), factory);
        self
    }

    pub fn build(self) -> Result<Site, SiteError> {
        let config = self.config;
        validate_config(&config).map_err(SiteError::Invalid)?;
        let settings = config.site.clone();

        // 1. Caches
        let mut caches = CacheManager::new(config.caches.clone());
        for (kind, factory) in self.cache_factories {
            caches.register_factory(&kind, factory);
        }
        let caches = Arc::new(caches);
        caches.initialize();

        // 2. Repositories
        let repositories =
            RepositoryManager::from_config(&config.repositories, &settings, &caches);

        // 3. Controllers
        let scripts_root = settings
            .scripts_root
            .as_deref()
            .map(|p| settings.resolve(p))
            .unwrap_or_else(|| settings.root.clone());
        let mut controllers = ControllerManager::new(
            self.natives,
            caches.get_or_create_with_default(SCRIPT_CACHE),
            scripts_root,
        );
        for interpreter in self.interpreters {
            controllers.register_interpreter(interpreter);
        }
        for helper in &config.helpers {
            controllers
                .register_helper(&helper.name, &helper.controller, &helper.options)
                .map_err(|source| SiteError::Helper {
                    name: helper.name.clone(),
                    source,
                })?;
        }

        // 4. Routes
        let routes = match &settings.routes_file {
            Some(file) => RouteManager::from_file(settings.resolve(file))?,
            None => RouteManager::from_entries(&config.routes),
        };

        // 5. Filters and engines
        let filters = FilterChain::from_config(&config.filters);
        let engines = TemplateEngines::from_config(&config.template_engines, &self.engine_factories);

        tracing::info!(
            repositories = repositories.len(),
            routes = routes.len(),
            before_filters = filters.before().len(),
            after_filters = filters.after().len(),
            engines = ?engines.names(),
            "Site built"
        );

        Ok(Site {
            settings,
            caches,
            repositories,
            controllers,
            routes: Arc::new(routes),
            filters,
            engines,
        })
    }
}
