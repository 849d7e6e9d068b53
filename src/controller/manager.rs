//! Controller resolution, script caching and execution.
//!
//! # Responsibilities
//! - Resolve an identifier to an executable controller
//! - Compile script controllers at most once per identifier
//! - Run controllers, normalizing failures and panics into typed errors
//!
//! # Design Decisions
//! - Compiled scripts live in the `scripts` named cache, keyed by identifier
//! - Cache hits never lock; a miss takes the compile lock and re-checks,
//!   so concurrent first requests compile once
//! - No modification-time check: a changed script is only picked up after
//!   `evict_script`

use std::collections::HashMap;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::cache::lock::LockRecover;
use crate::cache::{get_typed, NamedCache};
use crate::config::Options;
use crate::context::RequestContext;
use crate::controller::native::NativeRegistry;
use crate::controller::script::{extension_of, Interpreter, ScriptController};
use crate::controller::Controller;
use crate::error::{DispatchError, DispatchResult};

/// Name of the named cache holding compiled scripts.
pub const SCRIPT_CACHE: &str = "scripts";

const SOURCE: &str = "controller::manager";

/// Resolves and runs controllers.
pub struct ControllerManager {
    extensions: HashMap<String, Arc<dyn Controller>>,
    natives: NativeRegistry,
    interpreters: HashMap<String, Arc<dyn Interpreter>>,
    scripts: Arc<dyn NamedCache>,
    scripts_root: PathBuf,
    compile_lock: Mutex<()>,
}

impl ControllerManager {
    /// Create a manager. Script identifiers are resolved against `scripts_root`.
    pub fn new(
        natives: NativeRegistry,
        scripts: Arc<dyn NamedCache>,
        scripts_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            extensions: HashMap::new(),
            natives,
            interpreters: HashMap::new(),
            scripts,
            scripts_root: scripts_root.into(),
            compile_lock: Mutex::new(()),
        }
    }

    /// Register an interpreter for each of its extensions.
    pub fn register_interpreter(&mut self, interpreter: Arc<dyn Interpreter>) {
        for extension in interpreter.extensions() {
            tracing::debug!(
                language = %interpreter.language(),
                extension = %extension,
                "Registered script interpreter"
            );
            self.interpreters
                .insert(extension.to_ascii_lowercase(), interpreter.clone());
        }
    }

    /// Register an extension controller under an exact name.
    pub fn register_extension(&mut self, name: impl Into<String>, controller: Arc<dyn Controller>) {
        self.extensions.insert(name.into(), controller);
    }

    /// Build the native controller `id` with `options` and register it as `name`.
    pub fn register_helper(&mut self, name: &str, id: &str, options: &Options) -> DispatchResult<()> {
        let controller = self
            .natives
            .build(id, options)
            .ok_or_else(|| DispatchError::ControllerNotFound(id.to_string()))??;
        self.register_extension(name, controller);
        tracing::info!(helper = %name, controller = %id, "Registered helper");
        Ok(())
    }

    pub fn natives(&self) -> &NativeRegistry {
        &self.natives
    }

    pub fn scripts_root(&self) -> &Path {
        &self.scripts_root
    }

    /// Resolve an identifier.
    ///
    /// Order: extensions, cached scripts, script files, native registry.
    pub fn resolve(&self, identifier: &str) -> DispatchResult<Arc<dyn Controller>> {
        // 1. Extension controllers
        if let Some(controller) = self.extensions.get(identifier) {
            return Ok(controller.clone());
        }

        // 2. Cached scripts
        if let Some(script) = self.cached_script(identifier) {
            return Ok(script);
        }

        // 3. Script files
        if let Some((path, interpreter)) = self.script_file(identifier) {
            return self.load_script(identifier, &path, interpreter.as_ref());
        }

        // 4. Native registry
        if let Some(controller) = self.natives.instantiate(identifier) {
            return controller;
        }

        Err(DispatchError::ControllerNotFound(identifier.to_string()))
    }

    /// Resolve and run a controller.
    ///
    /// Typed errors pass through unchanged; untyped failures and panics
    /// become `DispatchError::Controller`.
    pub fn execute(
        &self,
        identifier: &str,
        ctx: &mut RequestContext,
        options: &Options,
    ) -> DispatchResult<()> {
        let controller = self.resolve(identifier)?;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| controller.execute(ctx, options)));
        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) if e.is_typed() => Err(e),
            Ok(Err(e)) => Err(DispatchError::Controller {
                name: identifier.to_string(),
                message: e.to_string(),
            }),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(controller = %identifier, panic = %message, "Controller panicked");
                Err(DispatchError::Controller {
                    name: identifier.to_string(),
                    message,
                })
            }
        }
    }

    /// Drop a compiled script so the next resolve re-reads it.
    pub fn evict_script(&self, identifier: &str) -> bool {
        let evicted = self.scripts.remove(identifier).is_some();
        if evicted {
            tracing::info!(script = %identifier, "Evicted compiled script");
        }
        evicted
    }

    /// Identifiers of every cached script.
    pub fn cached_scripts(&self) -> Vec<String> {
        let mut keys = self.scripts.list_keys();
        keys.sort();
        keys
    }

    fn cached_script(&self, identifier: &str) -> Option<Arc<dyn Controller>> {
        get_typed::<ScriptController>(self.scripts.as_ref(), identifier)
            .map(|script| script as Arc<dyn Controller>)
    }

    /// Location and interpreter for an identifier naming an existing script file.
    fn script_file(&self, identifier: &str) -> Option<(PathBuf, Arc<dyn Interpreter>)> {
        let interpreter = self.interpreters.get(&extension_of(identifier)?)?.clone();

        let relative = Path::new(identifier);
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            tracing::warn!(script = %identifier, "Rejected script identifier with parent components");
            return None;
        }

        let path = if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.scripts_root.join(relative)
        };
        path.is_file().then_some((path, interpreter))
    }

    fn load_script(
        &self,
        identifier: &str,
        path: &Path,
        interpreter: &dyn Interpreter,
    ) -> DispatchResult<Arc<dyn Controller>> {
        let _guard = self.compile_lock.lock_recover(SOURCE, "load_script");

        // Another request may have compiled it while we waited
        if let Some(script) = self.cached_script(identifier) {
            return Ok(script);
        }

        let source = fs::read_to_string(path).map_err(|e| DispatchError::Script {
            identifier: identifier.to_string(),
            message: format!("reading {}: {e}", path.display()),
        })?;
        let script = Arc::new(ScriptController::compile(
            identifier,
            path,
            source,
            interpreter,
        )?);

        if let Err(e) = self.scripts.put(identifier, script.clone()) {
            tracing::warn!(script = %identifier, error = %e, "Failed to cache compiled script");
        }
        tracing::info!(
            script = %identifier,
            language = %script.language(),
            "Compiled script controller"
        );
        Ok(script)
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panicked".to_string()
    }
}
