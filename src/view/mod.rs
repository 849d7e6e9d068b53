//! View rendering.
//!
//! # Data Flow
//! ```text
//! Dispatcher (template path, repository, context)
//!     → engines.rs TemplateEngines::select
//!         view engine > repository engine > extension match > default
//!     → ViewRenderer::render
//!         → source.rs load_template (read-through cache, freshness check)
//!         → jinja.rs | handlebars.rs | markdown.rs
//!     → rendered text written to the response sink
//! ```
//!
//! # Design Decisions
//! - Renderers are built from a factory registry keyed by engine id
//! - A missing top-level template is `FileNotFound`; a missing include is
//!   `TemplateNotFound`; any other templating failure is `View`
//! - A redirect requested from inside a template unwinds as
//!   `DispatchError::Redirect`, never as a view failure

pub mod engines;
pub mod handlebars;
pub mod jinja;
pub mod markdown;
pub mod source;

pub use engines::{EngineFactory, TemplateEngines};
pub use handlebars::HandlebarsRenderer;
pub use jinja::JinjaRenderer;
pub use markdown::MarkdownRenderer;

use std::io::Write;
use std::sync::{Arc, Mutex};

use crate::cache::lock::LockRecover;
use crate::context::RequestContext;
use crate::error::{DispatchError, DispatchResult};
use crate::repository::Repository;

/// Content type for rendered HTML.
pub const HTML: &str = "text/html; charset=utf-8";

/// A pluggable template engine.
pub trait ViewRenderer: Send + Sync {
    /// Name this renderer is registered under.
    fn name(&self) -> &str;

    /// Render the template at `path` in `repository` into `out`.
    ///
    /// Returns the number of bytes written.
    fn render(
        &self,
        path: &str,
        repository: &Arc<Repository>,
        ctx: &RequestContext,
        out: &mut dyn Write,
    ) -> DispatchResult<usize>;

    /// Expand literal template text against the context.
    fn evaluate(&self, text: &str, ctx: &RequestContext) -> DispatchResult<String>;

    /// File extensions this engine claims when nothing else binds one.
    fn extensions(&self) -> &[&str] {
        &[]
    }

    /// Content type of the rendered output.
    fn content_type(&self, _path: &str) -> String {
        HTML.to_string()
    }
}

/// Slot a template-side `redirect` call writes its location into.
#[derive(Debug, Clone, Default)]
pub(crate) struct RedirectSlot(Arc<Mutex<Option<String>>>);

impl RedirectSlot {
    pub(crate) fn request(&self, location: &str) {
        *self.0.lock_recover("view", "redirect_request") = Some(location.to_string());
    }

    pub(crate) fn take(&self) -> Option<String> {
        self.0.lock_recover("view", "redirect_take").take()
    }

    /// Convert an engine error, giving a requested redirect precedence.
    pub(crate) fn or_view_error(&self, template: &str, message: impl ToString) -> DispatchError {
        match self.take() {
            Some(location) => DispatchError::redirect(location),
            None => DispatchError::View {
                template: template.to_string(),
                message: message.to_string(),
            },
        }
    }
}

/// Write rendered text to the sink.
pub(crate) fn write_out(out: &mut dyn Write, rendered: &str) -> DispatchResult<usize> {
    out.write_all(rendered.as_bytes())
        .map_err(|e| DispatchError::failure(format!("writing rendered output: {e}")))?;
    Ok(rendered.len())
}
