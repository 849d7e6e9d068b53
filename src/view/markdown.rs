//! Markdown documents rendered to HTML with comrak.

use std::io::Write;
use std::sync::Arc;

use comrak::options::Options as MarkdownOptions;
use serde_json::Value;

use crate::config::Options;
use crate::context::RequestContext;
use crate::error::DispatchResult;
use crate::repository::Repository;
use crate::view::source::load_template;
use crate::view::{write_out, ViewRenderer};

pub struct MarkdownRenderer {
    name: String,
    options: MarkdownOptions<'static>,
}

impl MarkdownRenderer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: default_options(true),
        }
    }

    /// `unsafe_html = false` escapes raw HTML in documents.
    pub fn from_options(name: &str, options: &Options) -> Self {
        let unsafe_html = options
            .get("unsafe_html")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        Self {
            name: name.to_string(),
            options: default_options(unsafe_html),
        }
    }
}

fn default_options(unsafe_html: bool) -> MarkdownOptions<'static> {
    let mut options = MarkdownOptions::default();

    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.footnotes = true;
    ext.description_lists = true;
    ext.front_matter_delimiter = Some("---".to_string());

    let render = &mut options.render;
    render.github_pre_lang = true;
    render.r#unsafe = unsafe_html;

    options
}

impl ViewRenderer for MarkdownRenderer {
    fn name(&self) -> &str {
        &self.name
    }

    fn render(
        &self,
        path: &str,
        repository: &Arc<Repository>,
        _ctx: &RequestContext,
        out: &mut dyn Write,
    ) -> DispatchResult<usize> {
        let source = load_template(repository, path)?;
        let html = comrak::markdown_to_html(&source, &self.options);
        write_out(out, &html)
    }

    fn evaluate(&self, text: &str, _ctx: &RequestContext) -> DispatchResult<String> {
        Ok(comrak::markdown_to_html(text, &self.options))
    }

    fn extensions(&self) -> &[&str] {
        &["md", "markdown"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::http::Request;
    use crate::site::Site;

    fn context() -> RequestContext {
        let site = Site::builder(SiteConfig::default()).build().unwrap();
        RequestContext::new(Arc::new(site), Request::get("/"))
    }

    #[test]
    fn test_render_document_skips_front_matter() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("doc.md"),
            "---\ntitle: x\n---\n# Hello\n\n~~old~~ new\n",
        )
        .unwrap();
        let repo = Arc::new(Repository::new("docs", dir.path()));

        let mut out = Vec::new();
        MarkdownRenderer::new("markdown")
            .render("doc.md", &repo, &context(), &mut out)
            .unwrap();
        let html = String::from_utf8(out).unwrap();

        assert!(html.contains("<h1>Hello</h1>"));
        assert!(html.contains("<del>old</del>"));
        assert!(!html.contains("title: x"));
    }

    #[test]
    fn test_raw_html_escaped_when_disabled() {
        let mut options = Options::new();
        options.insert("unsafe_html".into(), Value::Bool(false));
        let renderer = MarkdownRenderer::from_options("markdown", &options);

        let html = renderer.evaluate("<b>x</b>", &context()).unwrap();
        assert!(!html.contains("<b>x</b>"));
    }
}
