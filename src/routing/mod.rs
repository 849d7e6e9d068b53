//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route file ([[routes]] entries)
//!     → manager.rs compile_routes (bad entries logged and skipped)
//!     → route.rs Route { pattern, methods, view }
//!     → RouteTable snapshot stored in an ArcSwap
//!
//! Incoming request (method, path)
//!     → RouteManager::match_route
//!     → first route in registration order whose method and pattern match
//!     → RouteMatch { route, params }
//!
//! On reload:
//!     new table built off the hot path → single atomic store
//! ```
//!
//! # Design Decisions
//! - Registration order is significant; first match wins
//! - Patterns compile to anchored regexes once, at load
//! - Readers never take a lock

pub mod manager;
pub mod pattern;
pub mod route;

pub use manager::{compile_routes, RouteManager, RouteMatch, RouteTable};
pub use pattern::{PathPattern, PatternError};
pub use route::{Route, View};
