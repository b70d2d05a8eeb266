//! Ancestor-chain evaluation.
//!
//! # Responsibility
//! - Fold a root-first ancestor chain into one displayed value.
//! - Apply one reply's operator to an already evaluated parent value.
//!
//! # Invariants
//! - Folding is strictly left to right starting at the root's number; the
//!   accumulated value is always the left operand (the dividend for `/`).
//! - Evaluated values are derived on read and never persisted.

use crate::model::post::{Operator, Post, PostId};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type EvalResult<T> = Result<T, EvalError>;

/// Errors raised while folding a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalError {
    /// No posts to fold.
    EmptyChain,
    /// The head is not a root, or a later entry has no operator.
    MalformedChain { position: usize, post_id: PostId },
    /// A `/` step had a zero operand.
    DivisionByZero { post_id: Option<PostId> },
}

impl Display for EvalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyChain => write!(f, "cannot evaluate an empty ancestor chain"),
            Self::MalformedChain { position, post_id } => write!(
                f,
                "malformed ancestor chain at position {position} (post {post_id})"
            ),
            Self::DivisionByZero { post_id: Some(id) } => {
                write!(f, "division by zero at post {id}")
            }
            Self::DivisionByZero { post_id: None } => write!(f, "division by zero"),
        }
    }
}

impl Error for EvalError {}

/// Applies `operator` with `accumulated` on the left.
pub fn apply(operator: Operator, accumulated: f64, operand: f64) -> EvalResult<f64> {
    match operator {
        Operator::Add => Ok(accumulated + operand),
        Operator::Subtract => Ok(accumulated - operand),
        Operator::Multiply => Ok(accumulated * operand),
        Operator::Divide if operand == 0.0 => Err(EvalError::DivisionByZero { post_id: None }),
        Operator::Divide => Ok(accumulated / operand),
    }
}

/// Left fold of `(operator, number)` terms starting from `start`.
pub fn fold_terms(
    start: f64,
    terms: impl IntoIterator<Item = (Operator, f64)>,
) -> EvalResult<f64> {
    terms
        .into_iter()
        .try_fold(start, |accumulated, (operator, operand)| {
            apply(operator, accumulated, operand)
        })
}

/// Folds a root-first ancestor chain into the last post's value.
pub fn evaluate_chain(chain: &[Post]) -> EvalResult<f64> {
    let (root, rest) = chain.split_first().ok_or(EvalError::EmptyChain)?;
    if root.operator.is_some() {
        return Err(EvalError::MalformedChain {
            position: 0,
            post_id: root.id,
        });
    }

    let mut accumulated = root.number;
    for (offset, post) in rest.iter().enumerate() {
        let operator = post.operator.ok_or(EvalError::MalformedChain {
            position: offset + 1,
            post_id: post.id,
        })?;
        accumulated = apply(operator, accumulated, post.number).map_err(|_| {
            EvalError::DivisionByZero {
                post_id: Some(post.id),
            }
        })?;
    }
    Ok(accumulated)
}

/// Value of `post` given its parent's evaluated value.
///
/// Roots ignore `parent_value` and evaluate to their own number.
pub fn evaluate_step(parent_value: Option<f64>, post: &Post) -> EvalResult<f64> {
    match (post.operator, parent_value) {
        (None, _) => Ok(post.number),
        (Some(operator), Some(parent_value)) => apply(operator, parent_value, post.number)
            .map_err(|_| EvalError::DivisionByZero {
                post_id: Some(post.id),
            }),
        (Some(_), None) => Err(EvalError::MalformedChain {
            position: 0,
            post_id: post.id,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{apply, evaluate_chain, evaluate_step, fold_terms, EvalError};
    use crate::model::post::{Author, Operator, Post};

    fn post(id: i64, number: f64, operator: Option<Operator>) -> Post {
        Post {
            id,
            number,
            operator,
            parent_id: if operator.is_some() { Some(id - 1) } else { None },
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
    fn root_evaluates_to_own_number() {
        assert_eq!(evaluate_chain(&[post(1, 7.5, None)]), Ok(7.5));
    }

    #[test]
    fn chain_folds_left_to_right() {
        let chain = [
            post(1, 10.0, None),
            post(2, 5.0, Some(Operator::Add)),
            post(3, 2.0, Some(Operator::Multiply)),
        ];
        assert_eq!(evaluate_chain(&chain), Ok(30.0));
    }

    #[test]
    fn division_uses_accumulated_value_as_dividend() {
        let chain = [
            post(1, 9.0, None),
            post(2, 3.0, Some(Operator::Subtract)),
            post(3, 4.0, Some(Operator::Divide)),
        ];
        assert_eq!(evaluate_chain(&chain), Ok(1.5));
    }

    #[test]
    fn fold_terms_matches_chain_fold() {
        let chain = [
            post(1, 2.0, None),
            post(2, 3.0, Some(Operator::Divide)),
            post(3, 7.0, Some(Operator::Subtract)),
            post(4, -1.5, Some(Operator::Multiply)),
        ];
        let terms = chain[1..]
            .iter()
            .map(|entry| (entry.operator.unwrap(), entry.number));
        assert_eq!(fold_terms(chain[0].number, terms), evaluate_chain(&chain));
    }

    #[test]
    fn empty_and_malformed_chains_are_rejected() {
        assert_eq!(evaluate_chain(&[]), Err(EvalError::EmptyChain));
        assert_eq!(
            evaluate_chain(&[post(2, 1.0, Some(Operator::Add))]),
            Err(EvalError::MalformedChain {
                position: 0,
                post_id: 2
            })
        );
        assert_eq!(
            evaluate_chain(&[post(1, 1.0, None), post(2, 1.0, None)]),
            Err(EvalError::MalformedChain {
                position: 1,
                post_id: 2
            })
        );
    }

    #[test]
    fn zero_divisor_reports_offending_post() {
        assert_eq!(
            apply(Operator::Divide, 4.0, 0.0),
            Err(EvalError::DivisionByZero { post_id: None })
        );
        let chain = [post(1, 8.0, None), post(2, 0.0, Some(Operator::Divide))];
        assert_eq!(
            evaluate_chain(&chain),
            Err(EvalError::DivisionByZero { post_id: Some(2) })
        );
    }

    #[test]
    fn step_applies_one_operator_against_parent_value() {
        let reply = post(3, 4.0, Some(Operator::Subtract));
        assert_eq!(evaluate_step(Some(10.0), &reply), Ok(6.0));
        assert_eq!(evaluate_step(None, &post(1, 2.0, None)), Ok(2.0));
        assert!(evaluate_step(None, &reply).is_err());
    }
}
