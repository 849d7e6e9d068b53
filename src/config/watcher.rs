//! Route file watcher for hot reload.
//!
//! Polls the route file at a fixed interval and swaps in a freshly compiled
//! route table on every change. The watcher thread belongs to `notify`; request
//! workers never wait on it.

use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, PollWatcher, RecursiveMode, Watcher};
use thiserror::Error;

use crate::routing::RouteManager;

/// Error starting the route watcher.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("routes were not loaded from a file")]
    NoSource,

    #[error("watch error: {0}")]
    Notify(#[from] notify::Error),
}

/// Watches the route file of a `RouteManager`.
pub struct RouteWatcher {
    routes: Arc<RouteManager>,
    interval: Duration,
}

impl RouteWatcher {
    pub fn new(routes: Arc<RouteManager>, interval: Duration) -> Self {
        Self { routes, interval }
    }

    /// Start polling. Watching stops when the returned watcher is dropped.
    pub fn start(self) -> Result<PollWatcher, WatchError> {
        let path = self.routes.source().ok_or(WatchError::NoSource)?.to_path_buf();
        let routes = self.routes.clone();

        let mut watcher = PollWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Route file change detected, reloading");
                        // reload logs and counts its own failures
                        let _ = routes.reload();
                    }
                }
                Err(e) => tracing::error!(error = %e, "Route watch error"),
            },
            Config::default().with_poll_interval(self.interval),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(
            path = %path.display(),
            interval_ms = self.interval.as_millis() as u64,
            "Route watcher started"
        );
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{Route, View};

    #[test]
    fn test_requires_route_file() {
        let routes = Arc::new(RouteManager::new(vec![
            Route::new("home", "/", "", View::default()).unwrap(),
        ]));
        let watcher = RouteWatcher::new(routes, Duration::from_millis(50));
        assert!(matches!(watcher.start(), Err(WatchError::NoSource)));
    }
}
