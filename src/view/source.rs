//! Template source loading.

use std::sync::Arc;

use crate::error::DispatchResult;
use crate::repository::Repository;

/// Load template text, re-reading it when the file changed since it was cached.
pub fn load_template(repository: &Repository, path: &str) -> DispatchResult<Arc<str>> {
    let entry = repository.read_entry(path)?;
    if entry.modified == repository.last_modified(path) {
        return Ok(entry.text.clone());
    }

    tracing::debug!(
        repository = %repository.name(),
        template = %path,
        "Template changed on disk, re-reading"
    );
    repository.evict(path);
    repository.read(path)
}
