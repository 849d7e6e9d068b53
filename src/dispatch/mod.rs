//! Request dispatch.
//!
//! # Data Flow
//! ```text
//! Request
//!     → before filters                         (halt → response as is)
//!     → route match, view.before controllers   (halt → response as is)
//!     → default resolution
//!         template: view template > path lookup in the repository > default template
//!         static resources served as bytes
//!     → view controllers                       (halt → response as is)
//!     → render through the selected engine
//!     → view.after controllers, after filters
//!     → Response
//!
//! Any error
//!     → Redirect:            redirect response
//!     → ControllerNotFound:  204, empty body
//!     → otherwise:           logged, `<status>.html` from the templates repository,
//!                            or an empty body with the status if that fails too
//! ```

mod dispatcher;
mod resolve;

pub use dispatcher::Dispatcher;
pub use resolve::{lookup_path, Resolved};
