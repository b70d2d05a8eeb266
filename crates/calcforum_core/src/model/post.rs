//! Post domain model.
//!
//! # Responsibility
//! - Define the post record and its arithmetic operator.
//! - Validate root/reply shape before anything reaches storage.
//!
//! # Invariants
//! - `operator.is_none()` iff `parent_id.is_none()`.
//! - `number` is always finite.
//! - `operator == Some(Operator::Divide)` implies `number != 0`.

use crate::model::user::UserId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable post identifier assigned by storage.
pub type PostId = i64;

/// Arithmetic operator a reply applies to its parent's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,
}

impl Operator {
    /// All operators in display order.
    pub const ALL: [Operator; 4] = [
        Operator::Add,
        Operator::Subtract,
        Operator::Multiply,
        Operator::Divide,
    ];

    /// Single-character form used in storage and on the wire.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
        }
    }

    /// Parses the single-character form.
    pub fn from_symbol(value: &str) -> Option<Self> {
        match value {
            "+" => Some(Self::Add),
            "-" => Some(Self::Subtract),
            "*" => Some(Self::Multiply),
            "/" => Some(Self::Divide),
            _ => None,
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Shape violations rejected at write time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PostValidationError {
    /// Reply was given without an operator, or an update tried to clear it.
    MissingOperator,
    /// Root was given an operator.
    UnexpectedOperator,
    /// Reply divides by zero.
    DivisionByZero,
    /// Number is NaN or infinite.
    NonFiniteNumber(f64),
}

impl Display for PostValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingOperator => write!(f, "operator is required for child posts"),
            Self::UnexpectedOperator => write!(f, "root posts must not carry an operator"),
            Self::DivisionByZero => write!(f, "cannot divide by 0"),
            Self::NonFiniteNumber(value) => write!(f, "number must be finite, got {value}"),
        }
    }
}

impl Error for PostValidationError {}

/// Checks the root/reply shape of a post.
///
/// `has_parent` decides which shape applies; the operator must match it.
pub fn validate_shape(
    has_parent: bool,
    number: f64,
    operator: Option<Operator>,
) -> Result<(), PostValidationError> {
    if !number.is_finite() {
        return Err(PostValidationError::NonFiniteNumber(number));
    }
    match (has_parent, operator) {
        (true, None) => Err(PostValidationError::MissingOperator),
        (false, Some(_)) => Err(PostValidationError::UnexpectedOperator),
        (true, Some(Operator::Divide)) if number == 0.0 => {
            Err(PostValidationError::DivisionByZero)
        }
        _ => Ok(()),
    }
}

/// Public identity of a post owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

/// Post read model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Stable post id.
    pub id: PostId,
    /// Own operand. The displayed value is derived from the ancestor chain.
    pub number: f64,
    /// `None` for roots.
    pub operator: Option<Operator>,
    /// `None` for roots. Never changes after creation.
    pub parent_id: Option<PostId>,
    /// Creating user.
    pub owner: Author,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl Post {
    /// Returns whether this post starts a thread.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.owner.id == user_id
    }

    /// Re-checks shape rules on a loaded record.
    pub fn validate(&self) -> Result<(), PostValidationError> {
        validate_shape(self.parent_id.is_some(), self.number, self.operator)
    }
}

/// Create request for one post.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewPost {
    pub owner_id: UserId,
    pub number: f64,
    pub operator: Option<Operator>,
    pub parent_id: Option<PostId>,
}

impl NewPost {
    /// Starts a new thread.
    pub fn root(owner_id: UserId, number: f64) -> Self {
        Self {
            owner_id,
            number,
            operator: None,
            parent_id: None,
        }
    }

    /// Replies to `parent_id` with `operator number`.
    pub fn reply(owner_id: UserId, parent_id: PostId, operator: Operator, number: f64) -> Self {
        Self {
            owner_id,
            number,
            operator: Some(operator),
            parent_id: Some(parent_id),
        }
    }

    pub fn validate(&self) -> Result<(), PostValidationError> {
        validate_shape(self.parent_id.is_some(), self.number, self.operator)
    }
}

/// Partial update of a post's mutable fields.
///
/// `operator` distinguishes "leave as is" (`None`) from "clear"
/// (`Some(None)`); clearing is only ever valid on a root, where it is a no-op.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PostPatch {
    pub number: Option<f64>,
    pub operator: Option<Option<Operator>>,
}

impl PostPatch {
    pub fn number(number: f64) -> Self {
        Self {
            number: Some(number),
            operator: None,
        }
    }

    pub fn operator(operator: Operator) -> Self {
        Self {
            number: None,
            operator: Some(Some(operator)),
        }
    }

    pub fn clear_operator() -> Self {
        Self {
            number: None,
            operator: Some(None),
        }
    }

    pub fn with_number(mut self, number: f64) -> Self {
        self.number = Some(number);
        self
    }

    pub fn with_operator(mut self, operator: Operator) -> Self {
        self.operator = Some(Some(operator));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.number.is_none() && self.operator.is_none()
    }

    /// Resolves the fields `post` would hold after this patch.
    pub fn merged(&self, post: &Post) -> (f64, Option<Operator>) {
        (
            self.number.unwrap_or(post.number),
            self.operator.unwrap_or(post.operator),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_shape, Author, Operator, Post, PostPatch, PostValidationError};

    fn reply(number: f64, operator: Operator) -> Post {
        Post {
            id: 2,
            number,
            operator: Some(operator),
            parent_id: Some(1),
            owner: Author {
                id: 1,
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
            },
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn operator_symbols_round_trip() {
        for operator in Operator::ALL {
            assert_eq!(Operator::from_symbol(operator.symbol()), Some(operator));
        }
        assert_eq!(Operator::from_symbol("%"), None);
    }

    #[test]
    fn operator_serializes_as_symbol() {
        let json = serde_json::to_string(&Operator::Divide).unwrap();
        assert_eq!(json, "\"/\"");
        let parsed: Operator = serde_json::from_str("\"*\"").unwrap();
        assert_eq!(parsed, Operator::Multiply);
    }

    #[test]
    fn shape_rules_match_root_and_reply() {
        assert_eq!(validate_shape(false, 3.0, None), Ok(()));
        assert_eq!(validate_shape(true, 3.0, Some(Operator::Add)), Ok(()));
        assert_eq!(
            validate_shape(true, 3.0, None),
            Err(PostValidationError::MissingOperator)
        );
        assert_eq!(
            validate_shape(false, 3.0, Some(Operator::Add)),
            Err(PostValidationError::UnexpectedOperator)
        );
    }

    #[test]
    fn zero_divisor_is_rejected_including_negative_zero() {
        assert_eq!(
            validate_shape(true, 0.0, Some(Operator::Divide)),
            Err(PostValidationError::DivisionByZero)
        );
        assert_eq!(
            validate_shape(true, -0.0, Some(Operator::Divide)),
            Err(PostValidationError::DivisionByZero)
        );
        assert_eq!(validate_shape(true, 0.0, Some(Operator::Multiply)), Ok(()));
        assert_eq!(validate_shape(false, 0.0, None), Ok(()));
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        assert!(matches!(
            validate_shape(false, f64::NAN, None),
            Err(PostValidationError::NonFiniteNumber(_))
        ));
        assert!(matches!(
            validate_shape(true, f64::INFINITY, Some(Operator::Add)),
            Err(PostValidationError::NonFiniteNumber(_))
        ));
    }

    #[test]
    fn patch_merge_keeps_unspecified_fields() {
        let post = reply(4.0, Operator::Subtract);

        assert_eq!(PostPatch::default().merged(&post), (4.0, Some(Operator::Subtract)));
        assert_eq!(PostPatch::number(9.0).merged(&post), (9.0, Some(Operator::Subtract)));
        assert_eq!(
            PostPatch::operator(Operator::Divide).merged(&post),
            (4.0, Some(Operator::Divide))
        );
        assert_eq!(PostPatch::clear_operator().merged(&post), (4.0, None));
        assert!(PostPatch::default().is_empty());
        assert!(!PostPatch::number(1.0).with_operator(Operator::Add).is_empty());
    }
}
