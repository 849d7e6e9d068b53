//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! stencil.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → SiteConfig (validated, immutable)
//!     → Site::builder (managers built once)
//!
//! routes.toml (development mode):
//!     watcher.rs polls for changes
//!     → RouteManager::reload (compile, then atomic swap)
//! ```
//!
//! # Design Decisions
//! - Site config is immutable once loaded; only routes hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_routes, parse_config, parse_routes, ConfigError};
pub use schema::{
    CacheConfig, ControllerRef, EngineConfig, FilterConfig, FilterStage, HelperConfig,
    ListenerConfig, LogFormat, Mode, ObservabilityConfig, Options, RepositoryConfig, RouteConfig,
    SiteConfig, SiteSettings, ViewConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::{RouteWatcher, WatchError};
