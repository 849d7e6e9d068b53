//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with a single fallback handler
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Turn axum requests into core requests and run the dispatcher
//! - Serve until the shutdown signal fires
//!
//! # Design Decisions
//! - The dispatcher is synchronous; each request runs on the blocking pool
//! - The path is percent-decoded before dispatch so patterns see `µ`, not `%C2%B5`

use std::sync::Arc;
use std::time::Duration;

use axum::body::to_bytes;
use axum::extract::{Request as AxumRequest, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response as AxumResponse};
use axum::Router;
use percent_encoding::percent_decode_str;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::ListenerConfig;
use crate::dispatch::Dispatcher;
use crate::http::{Request, X_REQUEST_ID};
use crate::lifecycle::ShutdownSignal;
use crate::site::Site;

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub max_body_bytes: usize,
}

/// HTTP front end for a site.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(site: Arc<Site>, config: &ListenerConfig) -> Self {
        Self {
            router: build_router(site, config),
        }
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.recv().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the router with all middleware layers.
pub fn build_router(site: Arc<Site>, config: &ListenerConfig) -> Router {
    let state = AppState {
        dispatcher: Dispatcher::new(site),
        max_body_bytes: config.max_body_bytes,
    };
    let request_id = HeaderName::from_static(X_REQUEST_ID);

    Router::new()
        .fallback(dispatch_handler)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}

/// Generates a UUID v4 request ID when the client sent none.
#[derive(Clone, Copy, Default)]
struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

async fn dispatch_handler(State(state): State<AppState>, request: AxumRequest) -> AxumResponse {
    let (parts, body) = request.into_parts();

    // 1. Collect the body
    let body = match to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read request body");
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    // 2. Build the core request
    let path = percent_decode_str(parts.uri.path())
        .decode_utf8_lossy()
        .into_owned();
    let mut request = Request::new(parts.method, path);
    request.headers = parts.headers;
    if let Some(query) = parts.uri.query() {
        request = request.with_query(query);
    }
    let content_type = request.content_type().map(str::to_string);
    let request = request.with_body(content_type.as_deref(), body);

    // 3. Dispatch on the blocking pool
    let dispatcher = state.dispatcher.clone();
    match tokio::task::spawn_blocking(move || dispatcher.call(request)).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Dispatch task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
