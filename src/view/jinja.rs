//! Jinja-style templates via minijinja.
//!
//! Templates, includes and `extends` parents are all loaded from the
//! repository being rendered. A `redirect(location)` function lets a
//! template end the request with a redirect.

use std::io::Write;
use std::sync::Arc;

use minijinja::{Environment, Error, ErrorKind};
use serde_json::Value;

use crate::config::Options;
use crate::context::RequestContext;
use crate::error::{DispatchError, DispatchResult};
use crate::repository::Repository;
use crate::view::source::load_template;
use crate::view::{write_out, RedirectSlot, ViewRenderer};

/// Renderer for Jinja-style templates.
#[derive(Debug, Clone)]
pub struct JinjaRenderer {
    name: String,
    trim_blocks: bool,
    lstrip_blocks: bool,
}

impl JinjaRenderer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            trim_blocks: false,
            lstrip_blocks: false,
        }
    }

    /// Build from engine options (`trim_blocks`, `lstrip_blocks`).
    pub fn from_options(name: &str, options: &Options) -> Self {
        let flag = |key: &str| options.get(key).and_then(Value::as_bool).unwrap_or(false);
        Self {
            name: name.to_string(),
            trim_blocks: flag("trim_blocks"),
            lstrip_blocks: flag("lstrip_blocks"),
        }
    }

    fn environment(
        &self,
        repository: Option<Arc<Repository>>,
        redirect: &RedirectSlot,
    ) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_trim_blocks(self.trim_blocks);
        env.set_lstrip_blocks(self.lstrip_blocks);

        if let Some(repository) = repository {
            env.set_loader(move |name| match load_template(&repository, name) {
                Ok(text) => Ok(Some(text.to_string())),
                Err(DispatchError::FileNotFound(_)) => Ok(None),
                Err(e) => Err(Error::new(ErrorKind::InvalidOperation, e.to_string())),
            });
        }

        let slot = redirect.clone();
        env.add_function("redirect", move |location: String| -> Result<String, Error> {
            slot.request(&location);
            Err(Error::new(ErrorKind::InvalidOperation, "redirect requested"))
        });

        env
    }

    fn convert(&self, template: &str, error: Error, redirect: &RedirectSlot) -> DispatchError {
        if let Some(location) = redirect.take() {
            return DispatchError::redirect(location);
        }
        match error.kind() {
            ErrorKind::TemplateNotFound => {
                DispatchError::TemplateNotFound(error.name().unwrap_or(template).to_string())
            }
            _ => DispatchError::View {
                template: template.to_string(),
                message: format!("{error:#}"),
            },
        }
    }
}

impl ViewRenderer for JinjaRenderer {
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
        // Surface a missing top-level template as a missing file
        load_template(repository, path)?;

        let redirect = RedirectSlot::default();
        let env = self.environment(Some(repository.clone()), &redirect);
        let template = env
            .get_template(path)
            .map_err(|e| self.convert(path, e, &redirect))?;
        let rendered = template
            .render(ctx.template_data())
            .map_err(|e| self.convert(path, e, &redirect))?;

        write_out(out, &rendered)
    }

    fn evaluate(&self, text: &str, ctx: &RequestContext) -> DispatchResult<String> {
        let redirect = RedirectSlot::default();
        let env = self.environment(None, &redirect);
        env.render_str(text, ctx.template_data())
            .map_err(|e| self.convert("<inline>", e, &redirect))
    }

    fn extensions(&self) -> &[&str] {
        &["j2", "jinja"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::http::Request;
    use crate::site::Site;
    use std::fs;

    fn setup(files: &[(&str, &str)]) -> (tempfile::TempDir, Arc<Repository>, RequestContext) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        let repo = Arc::new(Repository::new("templates", dir.path()));
        let site = Site::builder(SiteConfig::default()).build().unwrap();
        let mut ctx = RequestContext::new(Arc::new(site), Request::get("/docs").with_param("q", "x"));
        ctx.put("title", "Docs");
        (dir, repo, ctx)
    }

    fn render(files: &[(&str, &str)], path: &str) -> DispatchResult<String> {
        let (_dir, repo, ctx) = setup(files);
        let mut out = Vec::new();
        JinjaRenderer::new("jinja").render(path, &repo, &ctx, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_render_with_inheritance() {
        let out = render(
            &[
                ("base.html", "<title>{% block title %}{% endblock %}</title>"),
                (
                    "page.html",
                    "{% extends 'base.html' %}{% block title %}{{ title }} {{ params.q }}{% endblock %}",
                ),
            ],
            "page.html",
        )
        .unwrap();
        assert_eq!(out, "<title>Docs x</title>");
    }

    #[test]
    fn test_missing_template_and_include() {
        assert!(matches!(
            render(&[], "nope.html"),
            Err(DispatchError::FileNotFound(_))
        ));
        assert!(matches!(
            render(&[("a.html", "{% include 'missing.html' %}")], "a.html"),
            Err(DispatchError::TemplateNotFound(_))
        ));
    }

    #[test]
    fn test_syntax_error_is_view_error() {
        assert!(matches!(
            render(&[("bad.html", "{% if %}")], "bad.html"),
            Err(DispatchError::View { .. })
        ));
    }

    #[test]
    fn test_redirect_unwinds_distinctly() {
        let err = render(&[("r.html", "before {{ redirect('/login') }} after")], "r.html").unwrap_err();
        assert!(matches!(err, DispatchError::Redirect { ref location, .. } if location == "/login"));
    }

    #[test]
    fn test_evaluate() {
        let (_dir, _repo, ctx) = setup(&[]);
        let out = JinjaRenderer::new("jinja")
            .evaluate("{{ title | upper }}", &ctx)
            .unwrap();
        assert_eq!(out, "DOCS");
    }
}
