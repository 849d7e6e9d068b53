//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, body limit)
//!     → request.rs (method, decoded path, headers, query and form parameters)
//!     → dispatch::Dispatcher on the blocking pool
//!     → response.rs (status, headers, content type, body)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{Request, X_REQUEST_ID};
pub use response::{Body, Response};
pub use server::{build_router, AppState, HttpServer};
