//! Route table with copy-and-swap reload.
//!
//! # Responsibilities
//! - Match method + path against routes in registration order
//! - Rebuild the table from the route file and swap it in atomically
//!
//! # Design Decisions
//! - The table is an immutable snapshot behind an `ArcSwap`; readers load a
//!   snapshot and keep using it even if a reload swaps mid-request
//! - A new table is built completely before the single pointer store
//! - One bad route entry is logged and skipped; a route file that fails
//!   to read or parse leaves the current table in place

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::http::Method;

use crate::config::loader::{load_routes, ConfigError};
use crate::config::RouteConfig;
use crate::observability::metrics;
use crate::routing::route::Route;

/// An immutable route list plus its name index.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
    by_name: HashMap<String, Arc<Route>>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        let routes: Vec<Arc<Route>> = routes.into_iter().map(Arc::new).collect();
        let mut by_name = HashMap::with_capacity(routes.len());
        for route in &routes {
            if by_name.contains_key(route.name()) {
                tracing::warn!(route = %route.name(), "Duplicate route name, keeping the first");
                continue;
            }
            by_name.insert(route.name().to_string(), route.clone());
        }
        Self { routes, by_name }
    }

    /// First route whose method constraint and pattern both match.
    pub fn find(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        self.routes.iter().find_map(|route| {
            route.matches(method, path).map(|params| RouteMatch {
                route: route.clone(),
                params,
            })
        })
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Route>> {
        self.by_name.get(name)
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// A matched route and the variables extracted from the path.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<Route>,
    pub params: Vec<(String, String)>,
}

/// Owns the live route table.
pub struct RouteManager {
    table: ArcSwap<RouteTable>,
    source: Option<PathBuf>,
}

impl RouteManager {
    /// A manager with a fixed route list and no backing file.
    pub fn new(routes: Vec<Route>) -> Self {
        Self {
            table: ArcSwap::from_pointee(RouteTable::new(routes)),
            source: None,
        }
    }

    /// Compile routes from raw entries.
    pub fn from_entries(entries: &[toml::Value]) -> Self {
        Self::new(compile_routes(entries))
    }

    /// Load routes from a file that later reloads re-read.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let entries = load_routes(&path)?;
        let manager = Self {
            table: ArcSwap::from_pointee(RouteTable::new(compile_routes(&entries))),
            source: Some(path),
        };
        tracing::info!(
            routes = manager.len(),
            source = %manager.source().map(|p| p.display().to_string()).unwrap_or_default(),
            "Loaded routes"
        );
        Ok(manager)
    }

    /// File reloads read from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<RouteTable> {
        self.table.load_full()
    }

    /// First route matching method and path in registration order.
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        self.table.load().find(method, path)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Route>> {
        self.table.load().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.table.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.load().is_empty()
    }

    /// Swap in a new route list.
    pub fn replace(&self, routes: Vec<Route>) {
        self.table.store(Arc::new(RouteTable::new(routes)));
    }

    /// Re-read the backing file and swap in the result.
    ///
    /// On failure the current table stays active. Returns the new route count.
    pub fn reload(&self) -> Result<usize, ConfigError> {
        let Some(source) = &self.source else {
            return Ok(self.len());
        };

        // 1. Build the new table off to the side
        let entries = match load_routes(source) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(
                    source = %source.display(),
                    error = %e,
                    "Route reload failed, keeping current routes"
                );
                metrics::record_route_reload("failure");
                return Err(e);
            }
        };
        let table = RouteTable::new(compile_routes(&entries));
        let count = table.len();

        // 2. Single atomic swap
        self.table.store(Arc::new(table));

        tracing::info!(source = %source.display(), routes = count, "Routes reloaded");
        metrics::record_route_reload("success");
        Ok(count)
    }
}

/// Compile raw route entries, skipping any that fail.
pub fn compile_routes(entries: &[toml::Value]) -> Vec<Route> {
    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let config: RouteConfig = match entry.clone().try_into() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(index, error = %e, "Skipping malformed route definition");
                    return None;
                }
            };
            match Route::from_config(&config) {
                Ok(route) => Some(route),
                Err(e) => {
                    tracing::warn!(index, path = %config.path, error = %e, "Skipping route");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::parse_routes;
    use crate::routing::View;

    #[test]
    fn test_first_match_wins() {
        let manager = RouteManager::new(vec![
            Route::new("specific", "/blog/{slug}", "", View::template("post.html")).unwrap(),
            Route::new("catch_all", "/{rest:.*}", "", View::template("page.html")).unwrap(),
        ]);

        let matched = manager.match_route(&Method::GET, "/blog/hello").unwrap();
        assert_eq!(matched.route.name(), "specific");
        assert_eq!(matched.params, vec![("slug".into(), "hello".into())]);

        let matched = manager.match_route(&Method::GET, "/about").unwrap();
        assert_eq!(matched.route.name(), "catch_all");
    }

    #[test]
    fn test_method_mismatch_falls_through() {
        let manager = RouteManager::new(vec![
            Route::new("post_only", "/form", "POST", View::default()).unwrap(),
            Route::new("any", "/form", "", View::default()).unwrap(),
        ]);
        let matched = manager.match_route(&Method::GET, "/form").unwrap();
        assert_eq!(matched.route.name(), "any");
    }

    #[test]
    fn test_bad_entries_skipped() {
        let entries = parse_routes(
            r#"
            [[routes]]
            name = "ok"
            path = "/ok"

            [[routes]]
            name = "bad_pattern"
            path = "/bad/{unclosed"

            [[routes]]
            name = "missing_path"

            [[routes]]
            name = "also_ok"
            path = "/also"
            "#,
        )
        .unwrap();

        let manager = RouteManager::from_entries(&entries);
        let names: Vec<_> = manager
            .snapshot()
            .routes()
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(names, vec!["ok", "also_ok"]);
    }

    #[test]
    fn test_failed_reload_keeps_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.toml");
        std::fs::write(&path, "[[routes]]\nname = \"home\"\npath = \"/\"\n").unwrap();

        let manager = RouteManager::from_file(&path).unwrap();
        let before = manager.snapshot();
        assert_eq!(before.len(), 1);

        std::fs::write(&path, "[[routes]\nthis is not toml").unwrap();
        assert!(manager.reload().is_err());
        assert!(manager.match_route(&Method::GET, "/").is_some());

        std::fs::write(
            &path,
            "[[routes]]\nname = \"a\"\npath = \"/a\"\n[[routes]]\nname = \"b\"\npath = \"/b\"\n",
        )
        .unwrap();
        assert_eq!(manager.reload().unwrap(), 2);
        assert!(manager.match_route(&Method::GET, "/").is_none());

        // A snapshot taken before the swap is untouched
        assert_eq!(before.len(), 1);
        assert_eq!(before.routes()[0].name(), "home");
    }
}
