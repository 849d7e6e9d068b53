//! Path pattern compilation.
//!
//! # Responsibilities
//! - Compile `/blog/{slug}` style templates into anchored regexes
//! - Support per-variable constraints: `{version:.*}`, `{id:[0-9]{1,6}}`
//! - Extract named variables from a matching path
//!
//! # Design Decisions
//! - Literal text is escaped, so only `{...}` sections carry regex syntax
//! - An unconstrained variable matches one segment (`[^/]+`)
//! - Braces inside a constraint nest, so quantifiers like `{3}` work
//! - Shared by routes and filters so both match paths identically

use std::fmt;

use regex::Regex;
use thiserror::Error;

/// Default constraint for a variable without one.
const SEGMENT: &str = "[^/]+";

/// Error compiling a path pattern.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("unclosed variable in pattern {0}")]
    Unclosed(String),

    #[error("invalid variable name {name:?} in pattern {pattern}")]
    InvalidName { pattern: String, name: String },

    #[error("variable {name} appears twice in pattern {pattern}")]
    DuplicateVariable { pattern: String, name: String },

    #[error("invalid constraint in pattern {pattern}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A compiled path template.
#[derive(Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
    variables: Vec<String>,
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathPattern")
            .field("source", &self.source)
            .field("variables", &self.variables)
            .finish()
    }
}

impl PathPattern {
    /// Compile a pattern.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let mut expression = String::with_capacity(pattern.len() * 2);
        let mut variables: Vec<String> = Vec::new();
        let mut literal = String::new();
        expression.push('^');

        let mut chars = pattern.char_indices();
        while let Some((start, c)) = chars.next() {
            if c != '{' {
                literal.push(c);
                continue;
            }

            expression.push_str(&regex::escape(&literal));
            literal.clear();

            // Find the matching close brace, allowing nested braces in the constraint
            let mut depth = 1;
            let mut end = None;
            for (i, c) in chars.by_ref() {
                match c {
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            end = Some(i);
                            break;
                        }
                    }
                    _ => {}
                }
            }
            let end = end.ok_or_else(|| PatternError::Unclosed(pattern.to_string()))?;
            let body = &pattern[start + 1..end];

            let (name, constraint) = match body.split_once(':') {
                Some((name, constraint)) => (name.trim(), constraint),
                None => (body.trim(), SEGMENT),
            };
            if !is_valid_name(name) {
                return Err(PatternError::InvalidName {
                    pattern: pattern.to_string(),
                    name: name.to_string(),
                });
            }
            if variables.iter().any(|v| v == name) {
                return Err(PatternError::DuplicateVariable {
                    pattern: pattern.to_string(),
                    name: name.to_string(),
                });
            }

            expression.push_str(&format!("(?P<{name}>{constraint})"));
            variables.push(name.to_string());
        }

        expression.push_str(&regex::escape(&literal));
        expression.push('$');

        let regex = Regex::new(&expression).map_err(|source| PatternError::InvalidRegex {
            pattern: pattern.to_string(),
            source,
        })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
            variables,
        })
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Variable names in declaration order.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Match a path, returning its variables in declaration order.
    pub fn captures(&self, path: &str) -> Option<Vec<(String, String)>> {
        let captures = self.regex.captures(path)?;
        Some(
            self.variables
                .iter()
                .map(|name| {
                    let value = captures
                        .name(name)
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default();
                    (name.clone(), value)
                })
                .collect(),
        )
    }
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_pattern() {
        let pattern = PathPattern::parse("/about.html").unwrap();
        assert!(pattern.is_match("/about.html"));
        // The dot is literal
        assert!(!pattern.is_match("/aboutxhtml"));
        assert!(!pattern.is_match("/about.html/extra"));
    }

    #[test]
    fn test_named_variables() {
        let pattern = PathPattern::parse("/blog/{year}/{slug}").unwrap();
        let params = pattern.captures("/blog/2024/hello-world").unwrap();
        assert_eq!(
            params,
            vec![
                ("year".to_string(), "2024".to_string()),
                ("slug".to_string(), "hello-world".to_string())
            ]
        );
        // Unconstrained variables do not cross segments
        assert!(pattern.captures("/blog/2024/a/b").is_none());
    }

    #[test]
    fn test_constrained_variable_with_unicode() {
        let pattern = PathPattern::parse("/micro/{name}/{version:.*}").unwrap();
        let params = pattern.captures("/micro/µ/0.1.2").unwrap();
        assert_eq!(params[0], ("name".to_string(), "µ".to_string()));
        assert_eq!(params[1], ("version".to_string(), "0.1.2".to_string()));
    }

    #[test]
    fn test_nested_braces_in_constraint() {
        let pattern = PathPattern::parse("/item/{id:[0-9]{3}}").unwrap();
        assert!(pattern.is_match("/item/123"));
        assert!(!pattern.is_match("/item/1234"));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(matches!(
            PathPattern::parse("/a/{name"),
            Err(PatternError::Unclosed(_))
        ));
        assert!(matches!(
            PathPattern::parse("/a/{9x}"),
            Err(PatternError::InvalidName { .. })
        ));
        assert!(matches!(
            PathPattern::parse("/a/{x}/{x}"),
            Err(PatternError::DuplicateVariable { .. })
        ));
        assert!(matches!(
            PathPattern::parse("/a/{x:[}"),
            Err(PatternError::InvalidRegex { .. })
        ));
    }
}
