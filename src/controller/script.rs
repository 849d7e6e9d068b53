//! Script controllers.
//!
//! # Responsibilities
//! - Define the interpreter adapter interface
//! - Wrap a compiled script as a `Controller`
//! - Move the request context into script bindings and back
//!
//! # Design Decisions
//! - A script is compiled once; the compiled form is what gets cached
//! - Scripts act only by mutating the `context` binding; the result value
//!   of the script is ignored
//! - Mutations are written back only when the script completes

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::config::Options;
use crate::context::RequestContext;
use crate::controller::Controller;
use crate::error::{DispatchError, DispatchResult};

/// Error compiling or running a script.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to compile {identifier}: {message}")]
    Compile { identifier: String, message: String },

    #[error("{identifier} failed: {message}")]
    Runtime { identifier: String, message: String },

    #[error("{identifier}: cannot convert binding {binding}: {message}")]
    Binding {
        identifier: String,
        binding: &'static str,
        message: String,
    },
}

impl ScriptError {
    pub fn identifier(&self) -> &str {
        match self {
            ScriptError::Compile { identifier, .. }
            | ScriptError::Runtime { identifier, .. }
            | ScriptError::Binding { identifier, .. } => identifier,
        }
    }
}

impl From<ScriptError> for DispatchError {
    fn from(error: ScriptError) -> Self {
        DispatchError::Script {
            identifier: error.identifier().to_string(),
            message: error.to_string(),
        }
    }
}

/// Variables bound into a script run.
#[derive(Debug, Clone)]
pub struct ScriptBindings {
    /// Request context snapshot; read back after the run.
    pub context: Value,
    /// Options the controller was invoked with.
    pub options: Value,
}

/// Adapter for one embedded scripting language.
pub trait Interpreter: Send + Sync {
    /// Language id, e.g. `rhai`.
    fn language(&self) -> &str;

    /// File extensions (without the dot) handled by this interpreter.
    fn extensions(&self) -> &[&str];

    /// Compile source text into a runnable script.
    fn compile(&self, identifier: &str, source: &str) -> Result<Arc<dyn CompiledScript>, ScriptError>;
}

/// A compiled script, runnable any number of times.
pub trait CompiledScript: Send + Sync {
    fn execute(&self, bindings: &mut ScriptBindings) -> Result<(), ScriptError>;
}

/// A controller backed by a script file.
pub struct ScriptController {
    identifier: String,
    path: PathBuf,
    language: String,
    source: Arc<str>,
    compiled: Arc<dyn CompiledScript>,
}

impl ScriptController {
    /// Compile `source` with `interpreter`.
    pub fn compile(
        identifier: impl Into<String>,
        path: impl Into<PathBuf>,
        source: impl Into<Arc<str>>,
        interpreter: &dyn Interpreter,
    ) -> Result<Self, ScriptError> {
        let identifier = identifier.into();
        let source = source.into();
        let compiled = interpreter.compile(&identifier, &source)?;
        Ok(Self {
            identifier,
            path: path.into(),
            language: interpreter.language().to_string(),
            source,
            compiled,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl std::fmt::Debug for ScriptController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptController")
            .field("identifier", &self.identifier)
            .field("path", &self.path)
            .field("language", &self.language)
            .finish()
    }
}

impl Controller for ScriptController {
    fn execute(&self, ctx: &mut RequestContext, options: &Options) -> DispatchResult<()> {
        let mut bindings = ScriptBindings {
            context: ctx.script_bindings(),
            options: Value::Object(options.clone()),
        };

        tracing::debug!(
            script = %self.identifier,
            language = %self.language,
            "Running script controller"
        );
        self.compiled.execute(&mut bindings)?;

        ctx.absorb_script_bindings(&bindings.context);
        Ok(())
    }
}

/// Extension of an identifier, lowercased.
pub fn extension_of(identifier: &str) -> Option<String> {
    Path::new(identifier)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}
