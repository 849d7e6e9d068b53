//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::SiteConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate site configuration from a TOML file.
///
/// A relative `site.root` is resolved against the config file's directory.
pub fn load_config(path: &Path) -> Result<SiteConfig, ConfigError> {
    let content = read(path)?;
    let mut config = parse_config(&content)?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    if config.site.root.is_relative() {
        config.site.root = base.join(&config.site.root);
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Parse site configuration from TOML text without validating it.
pub fn parse_config(content: &str) -> Result<SiteConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Read the raw route entries from a route file.
///
/// Entries stay as raw TOML so each one is compiled, and skipped on
/// failure, individually. A file that is not valid TOML fails as a whole.
pub fn load_routes(path: &Path) -> Result<Vec<toml::Value>, ConfigError> {
    let content = read(path)?;
    parse_routes(&content)
}

/// Parse raw route entries from TOML text.
pub fn parse_routes(content: &str) -> Result<Vec<toml::Value>, ConfigError> {
    #[derive(serde::Deserialize)]
    struct RouteFile {
        #[serde(default)]
        routes: Vec<toml::Value>,
    }

    let file: RouteFile = toml::from_str(content)?;
    Ok(file.routes)
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_resolves_root_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stencil.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[site]\nroot = \"site\"").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.site.root, dir.path().join("site"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/stencil.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_parse_routes_keeps_raw_entries() {
        let routes = parse_routes(
            r#"
            [[routes]]
            path = "/a"

            [[routes]]
            bogus = true
            "#,
        )
        .unwrap();
        assert_eq!(routes.len(), 2);
    }

    #[test]
    fn test_invalid_toml_fails_whole_file() {
        assert!(matches!(
            parse_routes("[[routes]\npath = "),
            Err(ConfigError::Parse(_))
        ));
    }
}
