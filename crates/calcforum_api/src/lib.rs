//! Protocol-neutral request boundary over `calcforum_core`.
//!
//! Callers hand over a method, a path, an optional JSON body and the
//! authenticated actor id; they get back a status code and a JSON body.

pub mod config;
pub mod handler;
pub mod route;
pub mod view;

pub use config::ApiConfig;
pub use handler::{dispatch, ApiRequest, ApiResponse, ForumApi};
pub use route::{resolve, Method, Route, RouteError};
pub use view::{CountView, NodeView, PageView, PostListView, UserView};

/// Health check passthrough.
pub fn ping() -> &'static str {
    calcforum_core::ping()
}

/// Version of the core this boundary was built against.
pub fn core_version() -> &'static str {
    calcforum_core::core_version()
}
