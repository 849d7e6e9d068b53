//! Error taxonomy for the request pipeline.
//!
//! # Responsibilities
//! - Name every failure class a request can end in
//! - Map each class to the HTTP status the dispatcher answers with
//! - Keep redirect requests distinct from real failures
//!
//! # Design Decisions
//! - One enum crosses subsystem boundaries; subsystem-local errors convert into it
//! - `Failure` is the untyped error controller code raises; the controller
//!   manager wraps it into `Controller` with the controller's name attached
//! - `Redirect` is control flow, never rendered as an error page

use axum::http::StatusCode;
use thiserror::Error;

/// Errors that can end a dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The controller identifier resolved to nothing.
    #[error("controller not found: {0}")]
    ControllerNotFound(String),

    /// A controller or script failed while executing.
    #[error("controller {name} failed: {message}")]
    Controller { name: String, message: String },

    /// A resource does not exist in its repository.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// A template does not exist in its repository.
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// The renderer failed while expanding a template.
    #[error("view error in {template}: {message}")]
    View { template: String, message: String },

    /// A redirect was requested while rendering or executing a controller.
    #[error("redirect to {location}")]
    Redirect { location: String, status: StatusCode },

    /// A view named a repository that is not configured.
    #[error("repository not found: {0}")]
    RepositoryNotFound(String),

    /// Content dispatch needs a default repository and none is configured.
    #[error("no default repository configured")]
    NoDefaultRepository,

    /// A script failed to compile or run.
    #[error("script {identifier}: {message}")]
    Script { identifier: String, message: String },

    /// Untyped failure raised by controller code.
    #[error("{0}")]
    Failure(String),
}

/// Result type for the request pipeline.
pub type DispatchResult<T> = Result<T, DispatchError>;

impl DispatchError {
    /// Build an untyped failure.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }

    /// Build a temporary redirect.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::Redirect {
            location: location.into(),
            status: StatusCode::FOUND,
        }
    }

    /// HTTP status this error is answered with.
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::ControllerNotFound(_) => StatusCode::NO_CONTENT,
            DispatchError::FileNotFound(_)
            | DispatchError::TemplateNotFound(_)
            | DispatchError::RepositoryNotFound(_) => StatusCode::NOT_FOUND,
            DispatchError::Redirect { status, .. } => *status,
            DispatchError::Controller { .. }
            | DispatchError::View { .. }
            | DispatchError::NoDefaultRepository
            | DispatchError::Script { .. }
            | DispatchError::Failure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short, stable name for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::ControllerNotFound(_) => "controller_not_found",
            DispatchError::Controller { .. } => "controller",
            DispatchError::FileNotFound(_) => "file_not_found",
            DispatchError::TemplateNotFound(_) => "template_not_found",
            DispatchError::View { .. } => "view",
            DispatchError::Redirect { .. } => "redirect",
            DispatchError::RepositoryNotFound(_) => "repository_not_found",
            DispatchError::NoDefaultRepository => "no_default_repository",
            DispatchError::Script { .. } => "script",
            DispatchError::Failure(_) => "failure",
        }
    }

    /// True for errors that already carry a type the controller manager must not rewrap.
    pub fn is_typed(&self) -> bool {
        !matches!(self, DispatchError::Failure(_))
    }
}
