//! Controller resolution and execution.
//!
//! # Data Flow
//! ```text
//! execute("scripts/nav.rhai", ctx, options)
//!     → manager.rs resolve:
//!         1. extension (helper) controllers by exact name
//!         2. script cache by identifier
//!         3. file under scripts_root with a known extension
//!            → script.rs ScriptController (compiled once, cached)
//!         4. native registry (native.rs)
//!         5. ControllerNotFound
//!     → Controller::execute(ctx, options)
//!     → untyped failures and panics wrapped as DispatchError::Controller
//! ```
//!
//! # Design Decisions
//! - Native controllers come from a name → factory registry filled at startup
//! - Interpreters sit behind a small trait; the core never names a runtime
//! - Controllers only act through the mutable request context

pub mod manager;
pub mod native;
pub mod rhai;
pub mod script;

pub use manager::ControllerManager;
pub use native::{NativeFactory, NativeRegistry};
pub use script::{CompiledScript, Interpreter, ScriptBindings, ScriptController, ScriptError};

use crate::config::Options;
use crate::context::RequestContext;
use crate::error::DispatchResult;

/// A unit of logic run against a request.
pub trait Controller: Send + Sync {
    fn execute(&self, ctx: &mut RequestContext, options: &Options) -> DispatchResult<()>;
}

impl<F> Controller for F
where
    F: Fn(&mut RequestContext, &Options) -> DispatchResult<()> + Send + Sync,
{
    fn execute(&self, ctx: &mut RequestContext, options: &Options) -> DispatchResult<()> {
        self(ctx, options)
    }
}
