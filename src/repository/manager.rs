//! Repository registry.

use std::sync::Arc;

use crate::cache::CacheManager;
use crate::config::{RepositoryConfig, SiteSettings};
use crate::error::{DispatchError, DispatchResult};
use crate::repository::Repository;
use crate::routing::View;

/// Name of the repository that serves error pages and shared templates.
pub const TEMPLATES_REPOSITORY: &str = "templates";

/// Owns the configured repositories in declaration order.
#[derive(Debug, Default)]
pub struct RepositoryManager {
    repositories: Vec<Arc<Repository>>,
    default: Option<Arc<Repository>>,
    templates: Option<Arc<Repository>>,
}

impl RepositoryManager {
    /// Build the manager. The default and templates handles are computed once here.
    pub fn new(repositories: Vec<Repository>) -> Self {
        let repositories: Vec<Arc<Repository>> = repositories.into_iter().map(Arc::new).collect();
        let default = repositories.iter().find(|r| r.is_default()).cloned();
        let templates = repositories
            .iter()
            .find(|r| r.name() == TEMPLATES_REPOSITORY)
            .cloned();

        if default.is_none() && !repositories.is_empty() {
            tracing::warn!("No default repository configured, content dispatch has no fallback");
        }

        Self {
            repositories,
            default,
            templates,
        }
    }

    /// Build repositories from configuration, binding their named caches.
    pub fn from_config(
        configs: &[RepositoryConfig],
        settings: &SiteSettings,
        caches: &CacheManager,
    ) -> Self {
        let repositories = configs
            .iter()
            .map(|config| {
                let mut repo = Repository::new(&config.name, settings.resolve(&config.path));
                if let Some(cache) = &config.cache {
                    repo = repo.with_cache(caches.get_or_create_with_default(cache));
                }
                if let Some(engine) = &config.engine {
                    repo = repo.with_engine(engine);
                }
                if let Some(view) = &config.view {
                    repo = repo.with_view(View::from_config(view));
                }
                if config.default {
                    repo = repo.as_default();
                }
                tracing::info!(
                    repository = %config.name,
                    root = %repo.root().display(),
                    "Registered repository"
                );
                repo
            })
            .collect();
        Self::new(repositories)
    }

    /// Linear lookup by name.
    pub fn get_repository(&self, name: &str) -> Option<Arc<Repository>> {
        self.repositories.iter().find(|r| r.name() == name).cloned()
    }

    /// Repository by name, or the default one when no name is given.
    pub fn resolve(&self, name: Option<&str>) -> DispatchResult<Arc<Repository>> {
        match name {
            Some(name) => self
                .get_repository(name)
                .ok_or_else(|| DispatchError::RepositoryNotFound(name.to_string())),
            None => self.default.clone().ok_or(DispatchError::NoDefaultRepository),
        }
    }

    pub fn default_repository(&self) -> Option<&Arc<Repository>> {
        self.default.as_ref()
    }

    pub fn templates(&self) -> Option<&Arc<Repository>> {
        self.templates.as_ref()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Repository>> {
        self.repositories.iter()
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_and_templates_handles() {
        let manager = RepositoryManager::new(vec![
            Repository::new("content", "/srv/content").as_default(),
            Repository::new(TEMPLATES_REPOSITORY, "/srv/templates"),
        ]);

        assert_eq!(manager.default_repository().unwrap().name(), "content");
        assert_eq!(manager.templates().unwrap().name(), "templates");
        assert_eq!(manager.resolve(None).unwrap().name(), "content");
        assert_eq!(manager.resolve(Some("templates")).unwrap().name(), "templates");
    }

    #[test]
    fn test_missing_repositories() {
        let manager = RepositoryManager::new(vec![Repository::new("content", "/srv/content")]);
        assert!(matches!(
            manager.resolve(None),
            Err(DispatchError::NoDefaultRepository)
        ));
        assert!(matches!(
            manager.resolve(Some("blog")),
            Err(DispatchError::RepositoryNotFound(name)) if name == "blog"
        ));
        assert!(manager.templates().is_none());
    }

    #[test]
    fn test_from_config_binds_cache() {
        let caches = CacheManager::default();
        let configs = vec![RepositoryConfig {
            name: "content".into(),
            path: "content".into(),
            cache: Some("content".into()),
            default: true,
            engine: Some("jinja".into()),
            view: None,
        }];
        let settings = SiteSettings {
            root: "/srv/site".into(),
            ..SiteSettings::default()
        };

        let manager = RepositoryManager::from_config(&configs, &settings, &caches);
        let repo = manager.default_repository().unwrap();
        assert_eq!(repo.root(), std::path::Path::new("/srv/site/content"));
        assert_eq!(repo.engine(), Some("jinja"));
        assert!(caches.lookup("content").is_some());
    }
}
