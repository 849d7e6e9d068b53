//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (repositories reference existing engines)
//! - Enforce single-default rules for repositories and engines
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SiteConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - Route entries are not validated here; bad routes are skipped at load
//! - Cache kinds are not validated here; embedders register their own and an
//!   unknown kind falls back to the in-memory cache

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::SiteConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("more than one default repository: {0:?}")]
    MultipleDefaultRepositories(Vec<String>),

    #[error("more than one default template engine: {0:?}")]
    MultipleDefaultEngines(Vec<String>),

    #[error("duplicate repository name: {0}")]
    DuplicateRepository(String),

    #[error("duplicate template engine name: {0}")]
    DuplicateEngine(String),

    #[error("repository {repository} uses unknown engine {engine}")]
    UnknownEngine { repository: String, engine: String },

    #[error("filter #{index} has an empty controller")]
    EmptyFilterController { index: usize },

    #[error("helper #{index} has an empty name")]
    EmptyHelperName { index: usize },
}

const BUILTIN_ENGINES: [&str; 3] = ["jinja", "handlebars", "markdown"];

/// Validate a parsed configuration.
pub fn validate_config(config: &SiteConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // 1. Repositories: unique names, at most one default
    let mut seen = HashSet::new();
    for repo in &config.repositories {
        if !seen.insert(repo.name.as_str()) {
            errors.push(ValidationError::DuplicateRepository(repo.name.clone()));
        }
    }
    let defaults: Vec<String> = config
        .repositories
        .iter()
        .filter(|r| r.default)
        .map(|r| r.name.clone())
        .collect();
    if defaults.len() > 1 {
        errors.push(ValidationError::MultipleDefaultRepositories(defaults));
    }

    // 2. Engines: unique names, at most one default
    let mut engines = HashSet::new();
    for engine in &config.template_engines {
        if !engines.insert(engine.name.as_str()) {
            errors.push(ValidationError::DuplicateEngine(engine.name.clone()));
        }
    }
    let default_engines: Vec<String> = config
        .template_engines
        .iter()
        .filter(|e| e.default)
        .map(|e| e.name.clone())
        .collect();
    if default_engines.len() > 1 {
        errors.push(ValidationError::MultipleDefaultEngines(default_engines));
    }

    // 3. Repository → engine references. Without configured engines the
    //    builtin set is registered.
    if config.template_engines.is_empty() {
        engines.extend(BUILTIN_ENGINES);
    }
    for repo in &config.repositories {
        if let Some(engine) = &repo.engine {
            if !engines.contains(engine.as_str()) {
                errors.push(ValidationError::UnknownEngine {
                    repository: repo.name.clone(),
                    engine: engine.clone(),
                });
            }
        }
    }

    // 4. Filters and helpers
    for (index, filter) in config.filters.iter().enumerate() {
        if filter.controller.trim().is_empty() {
            errors.push(ValidationError::EmptyFilterController { index });
        }
    }
    for (index, helper) in config.helpers.iter().enumerate() {
        if helper.name.trim().is_empty() {
            errors.push(ValidationError::EmptyHelperName { index });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
