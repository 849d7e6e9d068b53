//! Handlebars templates.
//!
//! Partials referenced with `{{> name}}` are discovered in the template text
//! and loaded from the same repository before rendering.

use std::collections::HashSet;
use std::io::Write;
use std::sync::{Arc, LazyLock};

use handlebars::{
    Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext, RenderError,
    RenderErrorReason,
};
use regex::Regex;
use serde_json::Value;

use crate::config::Options;
use crate::context::RequestContext;
use crate::error::{DispatchError, DispatchResult};
use crate::repository::Repository;
use crate::view::source::load_template;
use crate::view::{write_out, RedirectSlot, ViewRenderer};

static PARTIAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{~?#?>\s*([A-Za-z0-9_./-]+)").expect("partial pattern"));

/// Renderer for Handlebars templates.
#[derive(Debug, Clone)]
pub struct HandlebarsRenderer {
    name: String,
    strict: bool,
}

impl HandlebarsRenderer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            strict: false,
        }
    }

    /// Build from engine options (`strict`).
    pub fn from_options(name: &str, options: &Options) -> Self {
        Self {
            name: name.to_string(),
            strict: options
                .get("strict")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }

    fn registry(&self, redirect: &RedirectSlot) -> Handlebars<'static> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(self.strict);
        registry.register_helper(
            "redirect",
            Box::new(RedirectHelper {
                slot: redirect.clone(),
            }),
        );
        registry
    }

    /// Register every partial reachable from `source`.
    fn register_partials(
        &self,
        registry: &mut Handlebars<'static>,
        repository: &Repository,
        template: &str,
        source: &str,
    ) -> DispatchResult<()> {
        let mut seen = HashSet::new();
        let mut pending: Vec<String> = partial_names(source);

        while let Some(name) = pending.pop() {
            if !seen.insert(name.clone()) {
                continue;
            }
            let text = match load_template(repository, &name) {
                Ok(text) => text,
                Err(DispatchError::FileNotFound(_)) => {
                    return Err(DispatchError::TemplateNotFound(name));
                }
                Err(e) => return Err(e),
            };
            pending.extend(partial_names(&text));
            registry
                .register_partial(&name, text.as_ref())
                .map_err(|e| DispatchError::View {
                    template: template.to_string(),
                    message: format!("partial {name}: {e}"),
                })?;
        }
        Ok(())
    }
}

fn partial_names(source: &str) -> Vec<String> {
    PARTIAL
        .captures_iter(source)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

impl ViewRenderer for HandlebarsRenderer {
    fn name(&self) -> &str {
        &self.name
    }

    fn render(
        &self,
        path: &str,
        repository: &Arc<Repository>,
        ctx: &RequestContext,
        out: &mut dyn Write,
    ) -> DispatchResult<usize> {
        let source = load_template(repository, path)?;

        let redirect = RedirectSlot::default();
        let mut registry = self.registry(&redirect);
        self.register_partials(&mut registry, repository, path, &source)?;

        let rendered = registry
            .render_template(&source, &ctx.template_data())
            .map_err(|e| redirect.or_view_error(path, e))?;

        write_out(out, &rendered)
    }

    fn evaluate(&self, text: &str, ctx: &RequestContext) -> DispatchResult<String> {
        let redirect = RedirectSlot::default();
        self.registry(&redirect)
            .render_template(text, &ctx.template_data())
            .map_err(|e| redirect.or_view_error("<inline>", e))
    }

    fn extensions(&self) -> &[&str] {
        &["hbs", "handlebars"]
    }
}

/// `{{redirect "/location"}}` ends rendering with a redirect.
struct RedirectHelper {
    slot: RedirectSlot,
}

impl HelperDef for RedirectHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        _: &mut dyn Output,
    ) -> HelperResult {
        let location = h
            .param(0)
            .and_then(|p| p.value().as_str())
            .ok_or_else(|| RenderErrorReason::ParamNotFoundForIndex("redirect", 0))?;
        self.slot.request(location);
        Err(RenderError::from(RenderErrorReason::Other(
            "redirect requested".to_string(),
        )))
    }
}
