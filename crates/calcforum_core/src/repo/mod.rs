//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository writes must validate post shape before persistence.
//! - Repository APIs return semantic errors (`PostNotFound`, `UserNotFound`)
//!   in addition to DB transport errors.

pub mod post_repo;
pub mod user_repo;
