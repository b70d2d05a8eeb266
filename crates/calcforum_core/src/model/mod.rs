//! Domain model for the calculation forum.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Own the root/reply shape rules shared by repository and service layers.
//!
//! # Invariants
//! - A post is a root iff it has no parent iff it has no operator.
//! - A reply never divides by zero.

pub mod post;
pub mod user;
