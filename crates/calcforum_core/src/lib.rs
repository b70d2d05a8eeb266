//! Core domain logic for the calculation forum.
//! This crate is the single source of truth for post tree invariants.

pub mod db;
pub mod eval;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use eval::{evaluate_chain, evaluate_step, fold_terms, EvalError, EvalResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::post::{
    validate_shape, Author, NewPost, Operator, Post, PostId, PostPatch, PostValidationError,
};
pub use model::user::{NewUser, User, UserId, UserValidationError};
pub use repo::post_repo::{
    ChildWindow, PostRepoError, PostRepoResult, PostRepository, SqlitePostRepository,
};
pub use repo::user_repo::{SqliteUserRepository, UserRepoError, UserRepoResult, UserRepository};
pub use service::pagination::{get_page, page_offset, remaining_after, Page, PAGE_SIZE};
pub use service::post_service::{
    ErrorKind, EvaluatedPost, PostService, PostServiceError, PostServiceResult,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
