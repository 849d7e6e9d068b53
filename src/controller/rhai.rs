//! Rhai interpreter adapter.
//!
//! # Responsibilities
//! - Compile `.rhai` controller scripts to ASTs
//! - Bind `context`, `options` and a scoped `logger` per run
//! - Read the mutated `context` back out of the scope
//!
//! # Design Decisions
//! - One engine per interpreter, shared by every compiled script
//! - Security limits bound the work a script can do per request
//! - Values cross the boundary through serde, so scripts see plain maps
//!
//! Script view:
//! ```text
//! context.data.title = "Docs";
//! if context.params.page == "" { context.halt = true; }
//! logger.info(`rendering ${context.path}`);
//! ```

use std::sync::Arc;

use ::rhai::{Dynamic, Engine, Scope, AST};

use crate::controller::script::{CompiledScript, Interpreter, ScriptBindings, ScriptError};

/// Limits applied to every script run.
#[derive(Debug, Clone)]
pub struct ScriptLimits {
    pub max_operations: u64,
    pub max_call_levels: usize,
    pub max_expr_depth: usize,
    pub max_string_size: usize,
    pub max_array_size: usize,
    pub max_map_size: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_operations: 1_000_000,
            max_call_levels: 64,
            max_expr_depth: 64,
            max_string_size: 1024 * 1024,
            max_array_size: 10_000,
            max_map_size: 10_000,
        }
    }
}

/// Interpreter for `.rhai` scripts.
pub struct RhaiInterpreter {
    engine: Arc<Engine>,
}

impl RhaiInterpreter {
    pub fn new() -> Self {
        Self::with_limits(&ScriptLimits::default())
    }

    pub fn with_limits(limits: &ScriptLimits) -> Self {
        let mut engine = Engine::new();

        // 1. Security limits
        engine.set_max_operations(limits.max_operations);
        engine.set_max_call_levels(limits.max_call_levels);
        engine.set_max_expr_depths(limits.max_expr_depth, limits.max_expr_depth);
        engine.set_max_string_size(limits.max_string_size);
        engine.set_max_array_size(limits.max_array_size);
        engine.set_max_map_size(limits.max_map_size);

        // 2. Scoped logger
        engine
            .register_type_with_name::<ScriptLogger>("Logger")
            .register_fn("debug", ScriptLogger::debug)
            .register_fn("info", ScriptLogger::info)
            .register_fn("warn", ScriptLogger::warn)
            .register_fn("error", ScriptLogger::error);

        // 3. print/debug statements go to tracing
        engine.on_print(|text| tracing::info!(target: "stencil::script", "{text}"));
        engine.on_debug(|text, source, pos| {
            tracing::debug!(
                target: "stencil::script",
                source = source.unwrap_or("script"),
                position = %pos,
                "{text}"
            )
        });

        Self {
            engine: Arc::new(engine),
        }
    }
}

impl Default for RhaiInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter for RhaiInterpreter {
    fn language(&self) -> &str {
        "rhai"
    }

    fn extensions(&self) -> &[&str] {
        &["rhai"]
    }

    fn compile(&self, identifier: &str, source: &str) -> Result<Arc<dyn CompiledScript>, ScriptError> {
        let ast = self
            .engine
            .compile(source)
            .map_err(|e| ScriptError::Compile {
                identifier: identifier.to_string(),
                message: e.to_string(),
            })?;

        Ok(Arc::new(RhaiScript {
            engine: self.engine.clone(),
            ast,
            identifier: Arc::from(identifier),
        }))
    }
}

struct RhaiScript {
    engine: Arc<Engine>,
    ast: AST,
    identifier: Arc<str>,
}

impl RhaiScript {
    fn binding_error(&self, binding: &'static str, message: impl ToString) -> ScriptError {
        ScriptError::Binding {
            identifier: self.identifier.to_string(),
            binding,
            message: message.to_string(),
        }
    }
}

impl CompiledScript for RhaiScript {
    fn execute(&self, bindings: &mut ScriptBindings) -> Result<(), ScriptError> {
        let context = ::rhai::serde::to_dynamic(&bindings.context)
            .map_err(|e| self.binding_error("context", e))?;
        let options = ::rhai::serde::to_dynamic(&bindings.options)
            .map_err(|e| self.binding_error("options", e))?;

        let mut scope = Scope::new();
        scope.push_dynamic("context", context);
        scope.push_dynamic("options", options);
        scope.push(
            "logger",
            ScriptLogger {
                script: self.identifier.clone(),
            },
        );

        self.engine
            .run_ast_with_scope(&mut scope, &self.ast)
            .map_err(|e| ScriptError::Runtime {
                identifier: self.identifier.to_string(),
                message: e.to_string(),
            })?;

        let context = scope
            .get_value::<Dynamic>("context")
            .ok_or_else(|| self.binding_error("context", "binding was removed"))?;
        bindings.context =
            ::rhai::serde::from_dynamic(&context).map_err(|e| self.binding_error("context", e))?;
        Ok(())
    }
}

/// Logger handed to scripts, tagged with the script identifier.
#[derive(Debug, Clone)]
pub struct ScriptLogger {
    script: Arc<str>,
}

impl ScriptLogger {
    fn debug(&mut self, message: Dynamic) {
        tracing::debug!(script = %self.script, "{message}");
    }

    fn info(&mut self, message: Dynamic) {
        tracing::info!(script = %self.script, "{message}");
    }

    fn warn(&mut self, message: Dynamic) {
        tracing::warn!(script = %self.script, "{message}");
    }

    fn error(&mut self, message: Dynamic) {
        tracing::error!(script = %self.script, "{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(source: &str, context: serde_json::Value) -> Result<ScriptBindings, ScriptError> {
        let interpreter = RhaiInterpreter::new();
        let script = interpreter.compile("test.rhai", source)?;
        let mut bindings = ScriptBindings {
            context,
            options: json!({"greeting": "hi"}),
        };
        script.execute(&mut bindings)?;
        Ok(bindings)
    }

    #[test]
    fn test_mutates_context() {
        let bindings = run(
            r#"
            context.data.title = options.greeting + " " + context.params.name;
            context.halt = true;
            logger.info("set title");
            "#,
            json!({"params": {"name": "ada"}, "data": {}, "halt": false}),
        )
        .unwrap();

        assert_eq!(bindings.context["data"]["title"], "hi ada");
        assert_eq!(bindings.context["halt"], true);
    }

    #[test]
    fn test_compile_error() {
        let err = run("let x = ;", json!({})).unwrap_err();
        assert!(matches!(err, ScriptError::Compile { .. }));
    }

    #[test]
    fn test_runtime_error() {
        let err = run(r#"throw "nope";"#, json!({})).unwrap_err();
        assert!(matches!(err, ScriptError::Runtime { ref message, .. } if message.contains("nope")));
    }

    #[test]
    fn test_operation_limit() {
        let interpreter = RhaiInterpreter::with_limits(&ScriptLimits {
            max_operations: 1_000,
            ..ScriptLimits::default()
        });
        let script = interpreter.compile("loop.rhai", "loop { }").unwrap();
        let mut bindings = ScriptBindings {
            context: json!({}),
            options: json!({}),
        };
        assert!(matches!(
            script.execute(&mut bindings),
            Err(ScriptError::Runtime { .. })
        ));
    }
}
