//! The per-request state machine.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use serde_json::json;

use crate::config::ControllerRef;
use crate::context::RequestContext;
use crate::controller::manager::panic_message;
use crate::dispatch::resolve::{resolve, Resolved};
use crate::error::{DispatchError, DispatchResult};
use crate::http::{Request, Response};
use crate::observability::metrics;
use crate::repository::Repository;
use crate::routing::View;
use crate::site::Site;

/// Runs requests through filters, routes, controllers and renderers.
#[derive(Clone)]
pub struct Dispatcher {
    site: Arc<Site>,
}

impl Dispatcher {
    pub fn new(site: Arc<Site>) -> Self {
        Self { site }
    }

    pub fn site(&self) -> &Arc<Site> {
        &self.site
    }

    /// Dispatch a request. Never panics and never fails: every error becomes
    /// a status-coded response.
    pub fn call(&self, request: Request) -> Response {
        let start = Instant::now();
        let mut ctx = RequestContext::new(self.site.clone(), request);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run(&mut ctx)));
        let response = match outcome {
            Ok(Ok(())) => ctx.take_response(),
            Ok(Err(e)) => self.handle_error(&mut ctx, e),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                self.handle_error(&mut ctx, DispatchError::Failure(message))
            }
        };

        tracing::debug!(
            method = %ctx.request().method,
            path = %ctx.path(),
            route = ?ctx.route(),
            status = response.status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request dispatched"
        );
        metrics::record_request(response.status.as_u16(), start);
        response
    }

    fn run(&self, ctx: &mut RequestContext) -> DispatchResult<()> {
        let site = self.site.as_ref();

        // 1. Before filters
        site.filters().run_before(site.controllers(), ctx);
        if ctx.is_halted() {
            return Ok(());
        }

        // 2. Route dispatch
        let route_view = match site.routes().match_route(&ctx.request().method, ctx.path()) {
            Some(matched) => {
                tracing::debug!(route = %matched.route.name(), path = %ctx.path(), "Route matched");
                ctx.merge_params(matched.params);
                ctx.set_route(Some(matched.route.name().to_string()));

                let view = matched.route.view().clone();
                self.run_controllers(&view.before, ctx)?;
                if ctx.is_halted() {
                    return Ok(());
                }
                Some(view)
            }
            None => None,
        };

        // 3. Default resolution
        let resolved = resolve(
            site.repositories(),
            site.settings(),
            route_view.as_ref(),
            ctx.path(),
        )?;

        // 4. View controllers
        let view = resolved.view().cloned();
        if let Some(view) = &view {
            self.run_controllers(&view.controllers, ctx)?;
            if ctx.is_halted() {
                return Ok(());
            }
        }

        // 5. Render or serve
        match resolved {
            Resolved::Static {
                repository, path, ..
            } => serve_static(&repository, &path, ctx)?,
            Resolved::Template {
                repository,
                template,
                ..
            } => self.render(view.as_ref(), &repository, &template, ctx)?,
        }

        // 6. After controllers and filters
        if let Some(view) = &view {
            self.run_controllers(&view.after, ctx)?;
        }
        site.filters().run_after(site.controllers(), ctx);
        Ok(())
    }

    /// Run controllers in order, stopping at the first halt.
    fn run_controllers(
        &self,
        controllers: &[ControllerRef],
        ctx: &mut RequestContext,
    ) -> DispatchResult<()> {
        for controller in controllers {
            if ctx.is_halted() {
                break;
            }
            self.site
                .controllers()
                .execute(&controller.name, ctx, &controller.options)?;
        }
        Ok(())
    }

    fn render(
        &self,
        view: Option<&View>,
        repository: &Arc<Repository>,
        template: &str,
        ctx: &mut RequestContext,
    ) -> DispatchResult<()> {
        let engine = self.site.engines().select(view, repository, template)?;

        let mut out = Vec::new();
        engine.render(template, repository, ctx, &mut out)?;

        let content_type = ctx
            .response()
            .content_type
            .clone()
            .unwrap_or_else(|| engine.content_type(template));
        let text = String::from_utf8(out)
            .map_err(|e| DispatchError::failure(format!("rendered output is not UTF-8: {e}")))?;
        ctx.response_mut().set_text(content_type, text);
        Ok(())
    }

    fn handle_error(&self, ctx: &mut RequestContext, error: DispatchError) -> Response {
        match error {
            DispatchError::Redirect { location, status } => {
                tracing::debug!(location = %location, status = status.as_u16(), "Redirect requested");
                Response::redirect(&location, status)
            }
            DispatchError::ControllerNotFound(identifier) => {
                tracing::warn!(
                    controller = %identifier,
                    path = %ctx.path(),
                    "Controller not found, answering with no content"
                );
                Response::empty(StatusCode::NO_CONTENT)
            }
            error => {
                let status = error.status();
                tracing::error!(
                    kind = error.kind(),
                    error = %error,
                    status = status.as_u16(),
                    method = %ctx.request().method,
                    path = %ctx.path(),
                    request_id = ?ctx.request().request_id(),
                    "Dispatch failed"
                );
                self.error_page(ctx, status)
            }
        }
    }

    /// Render `<status>.html` from the templates repository.
    ///
    /// Any failure here degrades to an empty body carrying `status`.
    fn error_page(&self, ctx: &mut RequestContext, status: StatusCode) -> Response {
        if !self.site.settings().error_pages {
            return Response::empty(status);
        }
        let Some(templates) = self.site.repositories().templates().cloned() else {
            return Response::empty(status);
        };
        let template = format!("{}.html", status.as_u16());

        ctx.put(
            "error",
            json!({
                "status": status.as_u16(),
                "reason": status.canonical_reason().unwrap_or_default(),
            }),
        );

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> DispatchResult<Response> {
            let engine = self.site.engines().select(None, &templates, &template)?;
            let mut out = Vec::new();
            engine.render(&template, &templates, ctx, &mut out)?;

            let mut response = Response::empty(status);
            response.set_text(
                engine.content_type(&template),
                String::from_utf8_lossy(&out).into_owned(),
            );
            Ok(response)
        }));

        match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!(template = %template, error = %e, "Error page failed to render");
                Response::empty(status)
            }
            Err(payload) => {
                tracing::warn!(
                    template = %template,
                    panic = %panic_message(payload.as_ref()),
                    "Error page panicked"
                );
                Response::empty(status)
            }
        }
    }
}

fn serve_static(repository: &Repository, path: &str, ctx: &mut RequestContext) -> DispatchResult<()> {
    let bytes = repository.read_bytes(path)?;
    let content_type = mime_guess::from_path(path).first_or_octet_stream();
    ctx.response_mut().set_bytes(content_type.to_string(), bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use std::fs;

    fn site(root: &std::path::Path, extra: &str) -> Arc<Site> {
        let mut config = parse_config(&format!(
            r#"
            [[repositories]]
            name = "content"
            path = "content"
            default = true

            [[repositories]]
            name = "templates"
            path = "templates"
            {extra}
            "#
        ))
        .unwrap();
        config.site.root = root.to_path_buf();
        Arc::new(Site::builder(config).build().unwrap())
    }

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("content")).unwrap();
        fs::create_dir_all(dir.path().join("templates")).unwrap();
        fs::write(dir.path().join("content/index.html"), "Hello {{ request.path }}").unwrap();
        fs::write(
            dir.path().join("templates/404.html"),
            "missing: {{ error.status }}",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_default_resolution_renders_index() {
        let dir = tree();
        let response = Dispatcher::new(site(dir.path(), "")).call(Request::get("/"));
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body.as_text(), "Hello /");
        assert_eq!(response.content_type.as_deref(), Some(crate::view::HTML));
    }

    #[test]
    fn test_missing_resource_renders_404_page() {
        let dir = tree();
        let response = Dispatcher::new(site(dir.path(), "")).call(Request::get("/nope"));
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.body.as_text(), "missing: 404");
    }

    #[test]
    fn test_missing_error_page_degrades_to_empty() {
        let dir = tree();
        let response = Dispatcher::new(site(
            dir.path(),
            r#"
            [[routes]]
            path = "/boom"
            view = { template = "broken.html" }
            "#,
        ))
        .call(Request::get("/boom"));
        assert_eq!(response.status, StatusCode::NOT_FOUND);

        fs::write(dir.path().join("content/broken.html"), "{% if %}").unwrap();
        let response = Dispatcher::new(site(
            dir.path(),
            r#"
            [[routes]]
            path = "/boom"
            view = { template = "broken.html" }
            "#,
        ))
        .call(Request::get("/boom"));
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.body.is_empty());
    }

    #[test]
    fn test_unknown_controller_is_no_content() {
        let dir = tree();
        let response = Dispatcher::new(site(
            dir.path(),
            r#"
            [[routes]]
            path = "/"
            view = { controllers = ["does.not.exist"] }
            "#,
        ))
        .call(Request::get("/"));
        assert_eq!(response.status, StatusCode::NO_CONTENT);
        assert!(response.body.is_empty());
    }

    #[test]
    fn test_route_before_controller_halts() {
        let dir = tree();
        let response = Dispatcher::new(site(
            dir.path(),
            r#"
            [[routes]]
            path = "/"
            [routes.view]
            before = [{ name = "builtin.halt", options = { status = 403, body = "no" } }]
            "#,
        ))
        .call(Request::get("/"));
        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert_eq!(response.body.as_text(), "no");
    }
}
