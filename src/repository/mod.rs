//! Content repositories.
//!
//! # Responsibilities
//! - Map a logical resource name to a file under a configured root
//! - Read text through an optional named cache keyed by absolute path
//! - Expose modification times and raw byte access for static resources
//!
//! # Design Decisions
//! - Names are resolved lexically; `..` and absolute components are rejected
//! - The cache stores the text together with the modification time it was
//!   read at, so renderers can decide staleness; the repository never does
//! - Byte reads for static resources bypass the cache
//!
//! # Data Flow
//! ```text
//! read("docs/intro.md")
//!     → resolve against root → /site/content/docs/intro.md
//!     → cache hit?  return cached text
//!     → miss: read file, decode UTF-8, store {text, modified}, return
//! ```

pub mod manager;

pub use manager::RepositoryManager;

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use axum::body::Bytes;

use crate::cache::{get_typed, NamedCache};
use crate::error::{DispatchError, DispatchResult};
use crate::routing::View;

/// Text content as stored in a repository cache.
#[derive(Debug, Clone)]
pub struct CachedContent {
    pub text: Arc<str>,
    pub modified: Option<SystemTime>,
}

/// A named source of resources rooted at a directory.
pub struct Repository {
    name: String,
    root: PathBuf,
    cache: Option<Arc<dyn NamedCache>>,
    engine: Option<String>,
    default: bool,
    view: Option<View>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("name", &self.name)
            .field("root", &self.root)
            .field("cache", &self.cache.as_ref().map(|c| c.name().to_string()))
            .field("engine", &self.engine)
            .field("default", &self.default)
            .finish()
    }
}

impl Repository {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            cache: None,
            engine: None,
            default: false,
            view: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn NamedCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = Some(engine.into());
        self
    }

    pub fn with_view(mut self, view: View) -> Self {
        self.view = Some(view);
        self
    }

    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Engine bound to this repository.
    pub fn engine(&self) -> Option<&str> {
        self.engine.as_deref()
    }

    pub fn is_default(&self) -> bool {
        self.default
    }

    /// View applied to content resolved from this repository.
    pub fn view(&self) -> Option<&View> {
        self.view.as_ref()
    }

    /// Resolve a resource name to an absolute location under the root.
    pub fn resolve(&self, path: &str) -> DispatchResult<PathBuf> {
        let mut resolved = self.root.clone();
        for component in Path::new(path.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    tracing::warn!(
                        repository = %self.name,
                        path = %path,
                        "Rejected resource path escaping repository root"
                    );
                    return Err(DispatchError::FileNotFound(path.to_string()));
                }
            }
        }
        Ok(resolved)
    }

    /// True if `path` names a regular file.
    pub fn exists(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.is_file()).unwrap_or(false)
    }

    /// True if `path` names a directory.
    pub fn is_dir(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.is_dir()).unwrap_or(false)
    }

    /// Read a resource as UTF-8 text, through the cache when one is bound.
    pub fn read(&self, path: &str) -> DispatchResult<Arc<str>> {
        self.read_entry(path).map(|entry| entry.text.clone())
    }

    /// Read a resource with the modification time it was read at.
    pub fn read_entry(&self, path: &str) -> DispatchResult<Arc<CachedContent>> {
        let absolute = self.resolve(path)?;
        let key = cache_key(&absolute);

        // 1. Cache hit
        if let Some(cache) = &self.cache {
            if let Some(entry) = get_typed::<CachedContent>(cache.as_ref(), &key) {
                return Ok(entry);
            }
        }

        // 2. Read the store
        let modified = modified_time(&absolute);
        let bytes = fs::read(&absolute).map_err(|e| self.io_error(path, e))?;
        let text = String::from_utf8(bytes).map_err(|_| {
            DispatchError::failure(format!(
                "resource {path} in repository {} is not valid UTF-8",
                self.name
            ))
        })?;
        let entry = Arc::new(CachedContent {
            text: Arc::from(text),
            modified,
        });

        // 3. Store back
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(&key, entry.clone()) {
                tracing::warn!(
                    repository = %self.name,
                    error = %e,
                    "Failed to cache resource"
                );
            }
        }

        Ok(entry)
    }

    /// Read a resource as raw bytes. Never cached.
    pub fn read_bytes(&self, path: &str) -> DispatchResult<Bytes> {
        let absolute = self.resolve(path)?;
        fs::read(&absolute)
            .map(Bytes::from)
            .map_err(|e| self.io_error(path, e))
    }

    /// Open a resource for streaming.
    pub fn open(&self, path: &str) -> DispatchResult<File> {
        let absolute = self.resolve(path)?;
        File::open(&absolute).map_err(|e| self.io_error(path, e))
    }

    /// Modification time of a resource in the underlying store.
    pub fn last_modified(&self, path: &str) -> Option<SystemTime> {
        self.resolve(path).ok().and_then(|p| modified_time(&p))
    }

    /// Drop a resource from the cache. Returns true if it was cached.
    pub fn evict(&self, path: &str) -> bool {
        match (&self.cache, self.resolve(path)) {
            (Some(cache), Ok(absolute)) => cache.remove(&cache_key(&absolute)).is_some(),
            _ => false,
        }
    }

    fn io_error(&self, path: &str, error: io::Error) -> DispatchError {
        match error.kind() {
            io::ErrorKind::NotFound => DispatchError::FileNotFound(path.to_string()),
            _ => DispatchError::failure(format!(
                "reading {path} from repository {}: {error}",
                self.name
            )),
        }
    }
}

fn cache_key(absolute: &Path) -> String {
    absolute.to_string_lossy().into_owned()
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    fn repository_with(files: &[(&str, &str)]) -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }
        let repo = Repository::new("content", dir.path())
            .with_cache(Arc::new(MemoryCache::new("content")));
        (dir, repo)
    }

    #[test]
    fn test_read_through_cache() {
        let (dir, repo) = repository_with(&[("docs/intro.md", "# Intro")]);
        assert_eq!(&*repo.read("/docs/intro.md").unwrap(), "# Intro");

        // A cached read does not see the file change until evicted
        fs::write(dir.path().join("docs/intro.md"), "# Changed").unwrap();
        assert_eq!(&*repo.read("docs/intro.md").unwrap(), "# Intro");

        assert!(repo.evict("docs/intro.md"));
        assert_eq!(&*repo.read("docs/intro.md").unwrap(), "# Changed");
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let (_dir, repo) = repository_with(&[]);
        assert!(matches!(
            repo.read("nope.html"),
            Err(DispatchError::FileNotFound(p)) if p == "nope.html"
        ));
        assert!(repo.last_modified("nope.html").is_none());
    }

    #[test]
    fn test_parent_components_rejected() {
        let (_dir, repo) = repository_with(&[("a.html", "a")]);
        assert!(repo.resolve("../etc/passwd").is_err());
        assert!(!repo.exists("sub/../../a.html"));
        assert!(repo.exists("./a.html"));
    }

    #[test]
    fn test_read_bytes_and_metadata() {
        let (_dir, repo) = repository_with(&[("style.css", "body{}"), ("docs/x.md", "x")]);
        assert_eq!(repo.read_bytes("style.css").unwrap().as_ref(), b"body{}");
        assert!(repo.last_modified("style.css").is_some());
        assert!(repo.is_dir("docs"));
        assert!(!repo.is_dir("style.css"));
    }
}
