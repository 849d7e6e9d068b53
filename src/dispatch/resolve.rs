//! Default resolution: which repository resource answers a request.

use std::path::Path;
use std::sync::Arc;

use crate::config::SiteSettings;
use crate::error::{DispatchError, DispatchResult};
use crate::repository::{Repository, RepositoryManager};
use crate::routing::View;

/// Outcome of default resolution.
#[derive(Debug, Clone)]
pub enum Resolved {
    /// Render `template` from `repository`, under `view` if one applies.
    Template {
        repository: Arc<Repository>,
        template: String,
        view: Option<View>,
    },
    /// Serve the resource at `path` as bytes, under the route's view if any.
    Static {
        repository: Arc<Repository>,
        path: String,
        view: Option<View>,
    },
}

impl Resolved {
    /// The view whose controllers run around this resource.
    pub fn view(&self) -> Option<&View> {
        match self {
            Resolved::Template { view, .. } | Resolved::Static { view, .. } => view.as_ref(),
        }
    }
}

/// Resolve a request path against an optional route view.
///
/// An explicit view template wins. Otherwise the path is looked up in the
/// view's repository (or the default one), where a repository-level view may
/// substitute its own template and controllers.
pub fn resolve(
    repositories: &RepositoryManager,
    settings: &SiteSettings,
    route_view: Option<&View>,
    request_path: &str,
) -> DispatchResult<Resolved> {
    let repository_name = route_view.and_then(|v| v.repository.as_deref());

    // 1. Explicit template binding
    if let Some(view) = route_view {
        if let Some(template) = &view.template {
            return Ok(Resolved::Template {
                repository: repositories.resolve(repository_name)?,
                template: template.clone(),
                view: Some(view.clone()),
            });
        }
    }

    // 2. Path-based lookup
    let repository = repositories.resolve(repository_name)?;
    let found = lookup_path(&repository, settings, request_path)
        .ok_or_else(|| DispatchError::FileNotFound(request_path.to_string()))?;

    if is_static(settings, &found) {
        return Ok(Resolved::Static {
            repository,
            path: found,
            view: route_view.cloned(),
        });
    }

    let view = route_view.cloned().or_else(|| repository.view().cloned());
    match view.as_ref().and_then(|v| v.template.clone()) {
        Some(template) => {
            let template_repository = match view.as_ref().and_then(|v| v.repository.as_deref()) {
                Some(name) => repositories.resolve(Some(name))?,
                None => repository.clone(),
            };
            Ok(Resolved::Template {
                repository: template_repository,
                template,
                view,
            })
        }
        None => Ok(Resolved::Template {
            repository,
            template: found,
            view,
        }),
    }
}

/// Find the resource answering `request_path` in `repository`.
///
/// Tries the exact file, then each configured extension. A directory (or
/// the root) resolves to the default template inside it; a directory
/// without one falls through to the extension candidates.
pub fn lookup_path(
    repository: &Repository,
    settings: &SiteSettings,
    request_path: &str,
) -> Option<String> {
    let relative = request_path.trim_matches('/');

    if relative.is_empty() {
        let index = settings.default_template.clone();
        return repository.exists(&index).then_some(index);
    }

    if repository.is_dir(relative) {
        let index = format!("{relative}/{}", settings.default_template);
        if repository.exists(&index) {
            return Some(index);
        }
    } else if repository.exists(relative) {
        return Some(relative.to_string());
    }

    settings
        .try_extensions
        .iter()
        .map(|ext| format!("{relative}.{ext}"))
        .find(|candidate| repository.exists(candidate))
}

fn is_static(settings: &SiteSettings, path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            settings
                .static_extensions
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
}
