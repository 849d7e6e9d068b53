//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use stencil::config::{parse_config, Options, SiteConfig};
use stencil::controller::{Controller, NativeFactory};
use stencil::{Dispatcher, DispatchResult, RequestContext, Site, SiteBuilder};

/// Base configuration: a default `content` repository and a `templates`
/// repository for error pages, both rooted in the fixture directory.
pub const BASE_CONFIG: &str = r#"
[site]
scripts_root = "scripts"

[[repositories]]
name = "content"
path = "content"
default = true

[[repositories]]
name = "templates"
path = "templates"
"#;

/// A site tree on disk: `content/`, `templates/`, `scripts/`.
pub struct SiteFixture {
    pub dir: tempfile::TempDir,
}

impl SiteFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["content", "templates", "scripts"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file relative to the fixture root, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) -> &Self {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
        self
    }

    /// Parse `BASE_CONFIG` plus `extra` and point the site root at the fixture.
    pub fn config(&self, extra: &str) -> SiteConfig {
        let mut config = parse_config(&format!("{BASE_CONFIG}\n{extra}")).unwrap();
        config.site.root = self.dir.path().to_path_buf();
        config
    }

    pub fn builder(&self, extra: &str) -> SiteBuilder {
        Site::builder(self.config(extra))
    }

    pub fn dispatcher(&self, extra: &str) -> Dispatcher {
        dispatcher(self.builder(extra))
    }
}

pub fn dispatcher(builder: SiteBuilder) -> Dispatcher {
    Dispatcher::new(Arc::new(builder.build().unwrap()))
}

/// A native controller factory that counts invocations and stores `tag` as `data.hit`.
pub fn counting(tag: &'static str, counter: Arc<AtomicUsize>) -> NativeFactory {
    Arc::new(move |_options: &Options| -> DispatchResult<Arc<dyn Controller>> {
        let counter = counter.clone();
        let controller = move |ctx: &mut RequestContext, _options: &Options| -> DispatchResult<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            ctx.put("hit", tag);
            Ok(())
        };
        Ok(Arc::new(controller))
    })
}
