//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a site.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Options handed to a controller or engine.
pub type Options = Map<String, Value>;

/// Root configuration for a site.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SiteConfig {
    /// Site-wide settings (mode, paths, defaults).
    pub site: SiteSettings,

    /// Listener configuration for the HTTP adapter.
    pub listener: ListenerConfig,

    /// Content repositories, in declaration order.
    pub repositories: Vec<RepositoryConfig>,

    /// Template engine definitions.
    pub template_engines: Vec<EngineConfig>,

    /// Named cache definitions.
    pub caches: std::collections::HashMap<String, CacheConfig>,

    /// Before/after filters, in declaration order.
    pub filters: Vec<FilterConfig>,

    /// Extension controllers registered under a name.
    pub helpers: Vec<HelperConfig>,

    /// Inline route definitions, used when no routes file is configured.
    ///
    /// Kept as raw TOML so one bad entry can be skipped without
    /// rejecting the whole file.
    pub routes: Vec<toml::Value>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Whether the site watches its route file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Development,
    #[default]
    Production,
}

/// Site-wide settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteSettings {
    /// Run mode. Development enables route hot reload.
    pub mode: Mode,

    /// Base directory for relative paths. Defaults to the config file's directory.
    pub root: PathBuf,

    /// Template used when a path resolves to a directory.
    pub default_template: String,

    /// Extensions tried when a path has no exact match.
    pub try_extensions: Vec<String>,

    /// Extensions served as raw bytes instead of being rendered.
    pub static_extensions: Vec<String>,

    /// Separate route file watched in development mode.
    pub routes_file: Option<PathBuf>,

    /// Poll interval for the route file watcher in seconds.
    pub reload_interval_secs: u64,

    /// Directory script controller identifiers are resolved against.
    pub scripts_root: Option<PathBuf>,

    /// Render error pages through the templates repository.
    pub error_pages: bool,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            mode: Mode::Production,
            root: PathBuf::from("."),
            default_template: "index.html".to_string(),
            try_extensions: vec!["html".to_string(), "md".to_string()],
            static_extensions: [
                "css", "js", "png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "woff", "woff2",
                "txt",
            ]
            .iter()
            .map(|ext| ext.to_string())
            .collect(),
            routes_file: None,
            reload_interval_secs: 2,
            scripts_root: None,
            error_pages: true,
        }
    }
}

impl SiteSettings {
    /// Resolve a possibly relative path against the site root.
    pub fn resolve(&self, path: &std::path::Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Largest request body accepted, in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 2 * 1024 * 1024,
            request_timeout_secs: 30,
        }
    }
}

/// A content repository.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RepositoryConfig {
    /// Unique repository name. `templates` serves error pages.
    pub name: String,

    /// Root directory of the repository.
    pub path: PathBuf,

    /// Named cache used for read-through caching.
    #[serde(default)]
    pub cache: Option<String>,

    /// Whether this is the default repository.
    #[serde(default)]
    pub default: bool,

    /// Template engine bound to this repository.
    #[serde(default)]
    pub engine: Option<String>,

    /// View applied to content resolved from this repository.
    #[serde(default)]
    pub view: Option<ViewConfig>,
}

/// A template engine instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Name repositories and views refer to.
    pub name: String,

    /// Factory id (`jinja`, `handlebars`, `markdown`).
    pub engine: String,

    /// Whether this is the default engine.
    #[serde(default)]
    pub default: bool,

    /// Engine-specific options.
    #[serde(default)]
    pub options: Options,
}

/// A named cache.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Implementation kind (`memory`, `lru`).
    pub kind: String,

    /// Maximum entries for bounded kinds.
    pub capacity: usize,

    /// Advisory flush interval in seconds.
    pub flush_interval_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            kind: "memory".to_string(),
            capacity: 1024,
            flush_interval_secs: None,
        }
    }
}

/// Pipeline stage a filter runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterStage {
    Before,
    After,
}

/// A before/after filter.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilterConfig {
    /// Stage the filter runs in.
    pub stage: FilterStage,

    /// Path pattern. Absent means the filter always fires.
    #[serde(default)]
    pub path: Option<String>,

    /// Controller invoked when the filter fires.
    pub controller: String,

    /// Options passed to the controller.
    #[serde(default)]
    pub options: Options,
}

/// An extension controller registration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HelperConfig {
    /// Name the controller is registered under.
    pub name: String,

    /// Native controller id to instantiate.
    pub controller: String,

    /// Options bound at registration time.
    #[serde(default)]
    pub options: Options,
}

/// A route definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging and lookup.
    #[serde(default)]
    pub name: Option<String>,

    /// Path pattern, e.g. `/micro/{name}/{version:.*}`.
    pub path: String,

    /// Allowed methods, comma separated. Empty matches any method.
    #[serde(default)]
    pub method: String,

    /// View rendered for matching requests.
    #[serde(default)]
    pub view: ViewConfig,
}

/// A view: template, repository and controllers.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Template name. Absent means path-based lookup.
    pub template: Option<String>,

    /// Repository holding the template. Absent means the default repository.
    pub repository: Option<String>,

    /// Engine override for this view.
    pub engine: Option<String>,

    /// Controllers run before rendering.
    pub controllers: Vec<ControllerRef>,

    /// Controllers run when the view is selected, before anything else.
    pub before: Vec<ControllerRef>,

    /// Controllers run after rendering.
    pub after: Vec<ControllerRef>,
}

/// A controller reference with its options.
///
/// Accepts either a bare name or a table with `name` and `options`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerRef {
    pub name: String,
    pub options: Options,
}

impl ControllerRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Options::new(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }
}

impl<'de> Deserialize<'de> for ControllerRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Name(String),
            Full {
                name: String,
                #[serde(default)]
                options: Options,
            },
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Name(name) => ControllerRef::new(name),
            Repr::Full { name, options } => ControllerRef { name, options },
        })
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SiteConfig::default();
        assert_eq!(config.site.mode, Mode::Production);
        assert_eq!(config.site.default_template, "index.html");
        assert_eq!(config.listener.request_timeout_secs, 30);
        assert!(config.repositories.is_empty());
    }

    #[test]
    fn test_parse_site_config() {
        let config: SiteConfig = toml::from_str(
            r#"
            [site]
            mode = "development"

            [[repositories]]
            name = "content"
            path = "content"
            default = true
            cache = "content"

            [[template_engines]]
            name = "jinja"
            engine = "jinja"
            default = true

            [caches.content]
            kind = "lru"
            capacity = 64

            [[filters]]
            stage = "before"
            path = "/admin/{rest:.*}"
            controller = "builtin.redirect"
            options = { location = "/login" }
            "#,
        )
        .unwrap();

        assert_eq!(config.site.mode, Mode::Development);
        assert_eq!(config.repositories[0].name, "content");
        assert!(config.repositories[0].default);
        assert_eq!(config.caches["content"].capacity, 64);
        assert_eq!(config.filters[0].stage, FilterStage::Before);
        assert_eq!(config.filters[0].options["location"], "/login");
    }

    #[test]
    fn test_controller_ref_forms() {
        let view: ViewConfig = toml::from_str(
            r#"
            controllers = ["scripts/a.rhai", { name = "nav", options = { depth = 2 } }]
            "#,
        )
        .unwrap();

        assert_eq!(view.controllers[0], ControllerRef::new("scripts/a.rhai"));
        assert_eq!(view.controllers[1].name, "nav");
        assert_eq!(view.controllers[1].options["depth"], 2);
    }
}
