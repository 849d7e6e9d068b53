//! Request-dispatch engine for server-rendered content.

// Core pipeline
pub mod context;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod routing;
pub mod site;

// Controllers, content and rendering
pub mod cache;
pub mod controller;
pub mod repository;
pub mod view;

// Adapter and cross-cutting concerns
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::schema::SiteConfig;
pub use context::RequestContext;
pub use dispatch::Dispatcher;
pub use error::{DispatchError, DispatchResult};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use site::{Site, SiteBuilder, SiteError};
