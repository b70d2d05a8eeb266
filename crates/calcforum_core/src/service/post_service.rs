//! Post lifecycle use-case service.
//!
//! # Responsibility
//! - Create, update, and delete posts on behalf of an authenticated actor.
//! - Enforce ownership above the repository layer.
//! - Attach evaluated values to everything it reads.
//!
//! # Invariants
//! - Only the owner of the exact post may update or delete it.
//! - A single post read folds its full ancestor chain.
//! - Page reads evaluate each item with one operator application against
//!   the parent's value instead of refolding every chain.

use crate::eval::{evaluate_chain, evaluate_step, EvalError};
use crate::model::post::{
    validate_shape, NewPost, Operator, Post, PostId, PostPatch, PostValidationError,
};
use crate::model::user::UserId;
use crate::repo::post_repo::{PostRepoError, PostRepository};
use crate::service::pagination::{get_page, Page};
use log::{info, warn};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Coarse error category used by outer layers to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Authorization,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Authorization => "authorization",
            Self::Internal => "internal",
        }
    }
}

/// Errors from post lifecycle operations.
#[derive(Debug)]
pub enum PostServiceError {
    /// Post shape is invalid.
    Validation(PostValidationError),
    /// Target post does not exist.
    PostNotFound(PostId),
    /// Parent given on create does not exist.
    ParentNotFound(PostId),
    /// Root posts have no parent to return.
    NoParent(PostId),
    /// Actor is not a known user.
    UserNotFound(UserId),
    /// Actor does not own the target post.
    NotOwner { actor_id: UserId, post_id: PostId },
    /// Stored tree could not be evaluated.
    Evaluation(EvalError),
    /// Repository-level failure.
    Repo(PostRepoError),
}

impl PostServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::PostNotFound(_)
            | Self::ParentNotFound(_)
            | Self::NoParent(_)
            | Self::UserNotFound(_) => ErrorKind::NotFound,
            Self::NotOwner { .. } => ErrorKind::Authorization,
            Self::Evaluation(_) | Self::Repo(_) => ErrorKind::Internal,
        }
    }
}

impl Display for PostServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::PostNotFound(id) => write!(f, "post #{id} not found"),
            Self::ParentNotFound(id) => write!(f, "parent post #{id} not found"),
            Self::NoParent(id) => write!(f, "post #{id} is a root and has no parent"),
            Self::UserNotFound(id) => write!(f, "user #{id} not found"),
            Self::NotOwner { actor_id, post_id } => write!(
                f,
                "user #{actor_id} is not allowed to modify post #{post_id}"
            ),
            Self::Evaluation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PostServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Evaluation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PostRepoError> for PostServiceError {
    fn from(value: PostRepoError) -> Self {
        match value {
            PostRepoError::Validation(err) => Self::Validation(err),
            PostRepoError::PostNotFound(id) => Self::PostNotFound(id),
            PostRepoError::ParentNotFound(id) => Self::ParentNotFound(id),
            PostRepoError::UserNotFound(id) => Self::UserNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<EvalError> for PostServiceError {
    fn from(value: EvalError) -> Self {
        Self::Evaluation(value)
    }
}

impl From<PostValidationError> for PostServiceError {
    fn from(value: PostValidationError) -> Self {
        Self::Validation(value)
    }
}

pub type PostServiceResult<T> = Result<T, PostServiceError>;

/// A post together with its displayed value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluatedPost {
    pub post: Post,
    pub value: f64,
}

/// Post lifecycle service facade.
pub struct PostService<R: PostRepository> {
    repo: R,
}

impl<R: PostRepository> PostService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Starts a thread (`parent_id = None`) or replies to an existing post.
    ///
    /// A reply requires an operator; a root must not have one.
    pub fn create_post(
        &self,
        actor_id: UserId,
        number: f64,
        operator: Option<Operator>,
        parent_id: Option<PostId>,
    ) -> PostServiceResult<Post> {
        let new_post = NewPost {
            owner_id: actor_id,
            number,
            operator,
            parent_id,
        };
        new_post.validate()?;

        let post = self.repo.create_post(&new_post)?;
        info!(
            "event=post_create module=post_service status=ok post_id={} parent_id={} actor_id={}",
            post.id,
            display_optional(post.parent_id),
            actor_id
        );
        Ok(post)
    }

    /// Applies a partial update as the post's owner.
    pub fn update_post(
        &self,
        actor_id: UserId,
        id: PostId,
        patch: &PostPatch,
    ) -> PostServiceResult<Post> {
        let current = self.repo.get_post(id)?;
        self.ensure_owner(actor_id, &current)?;

        let (number, operator) = patch.merged(&current);
        validate_shape(current.parent_id.is_some(), number, operator)?;

        let post = self.repo.update_post(id, patch)?;
        info!(
            "event=post_update module=post_service status=ok post_id={} actor_id={}",
            id, actor_id
        );
        Ok(post)
    }

    /// Deletes a post and its whole subtree as the post's owner.
    ///
    /// Ownership is checked on the target only; replies by other users go
    /// with it.
    pub fn delete_post(&self, actor_id: UserId, id: PostId) -> PostServiceResult<u64> {
        let current = self.repo.get_post(id)?;
        self.ensure_owner(actor_id, &current)?;

        let removed = self.repo.delete_post(id)?;
        info!(
            "event=post_delete module=post_service status=ok post_id={} actor_id={} removed={}",
            id, actor_id, removed
        );
        Ok(removed)
    }

    /// Reads one post with its value folded over the full ancestor chain.
    pub fn read_post(&self, id: PostId) -> PostServiceResult<EvaluatedPost> {
        let mut chain = self.repo.ancestor_chain(id)?;
        let value = evaluate_chain(&chain)?;
        let post = chain
            .pop()
            .ok_or(PostServiceError::Evaluation(EvalError::EmptyChain))?;
        Ok(EvaluatedPost { post, value })
    }

    /// Reads the direct parent of a post, evaluated.
    pub fn read_parent(&self, id: PostId) -> PostServiceResult<EvaluatedPost> {
        let post = self.repo.get_post(id)?;
        let parent_id = post.parent_id.ok_or(PostServiceError::NoParent(id))?;
        self.read_post(parent_id)
    }

    /// Counts direct replies of an existing post.
    pub fn children_count(&self, id: PostId) -> PostServiceResult<u64> {
        Ok(self.repo.count_children(Some(id))?)
    }

    /// Reads one page of replies under `id`, newest first.
    pub fn read_children_page(
        &self,
        id: PostId,
        page_index: u32,
    ) -> PostServiceResult<Page<EvaluatedPost>> {
        let parent = self.read_post(id)?;
        let page = get_page(&self.repo, Some(id), page_index)?;
        page.try_map(|post| evaluate_with_parent(Some(parent.value), post))
    }

    /// Reads one page of roots, newest first.
    pub fn read_roots_page(&self, page_index: u32) -> PostServiceResult<Page<EvaluatedPost>> {
        let page = get_page(&self.repo, None, page_index)?;
        page.try_map(|post| evaluate_with_parent(None, post))
    }

    /// Lists the roots one user started, newest first.
    pub fn list_roots_by_owner(&self, owner_id: UserId) -> PostServiceResult<Vec<EvaluatedPost>> {
        self.repo
            .list_roots_by_owner(owner_id)?
            .into_iter()
            .map(|post| evaluate_with_parent(None, post))
            .collect()
    }

    fn ensure_owner(&self, actor_id: UserId, post: &Post) -> PostServiceResult<()> {
        if post.is_owned_by(actor_id) {
            return Ok(());
        }
        warn!(
            "event=post_ownership_denied module=post_service status=rejected post_id={} actor_id={}",
            post.id, actor_id
        );
        Err(PostServiceError::NotOwner {
            actor_id,
            post_id: post.id,
        })
    }
}

fn evaluate_with_parent(
    parent_value: Option<f64>,
    post: Post,
) -> PostServiceResult<EvaluatedPost> {
    let value = evaluate_step(parent_value, &post)?;
    Ok(EvaluatedPost { post, value })
}

fn display_optional(value: Option<PostId>) -> String {
    value.map_or_else(|| "none".to_string(), |id| id.to_string())
}
