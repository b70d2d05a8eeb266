//! JSON shapes exchanged at the boundary.
//!
//! Field names are camelCase on the wire; timestamps are epoch milliseconds.

use calcforum_core::{
    Author, EvaluatedPost, Operator, Page, PostId, PostPatch, User, UserId,
};
use serde::{Deserialize, Deserializer, Serialize};

/// Post author as shown next to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorView {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

impl From<Author> for AuthorView {
    fn from(value: Author) -> Self {
        Self {
            id: value.id,
            name: value.name,
            email: value.email,
        }
    }
}

/// One evaluated post.
///
/// `number` is the evaluated value, not the stored operand. Non-finite
/// results serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeView {
    pub id: PostId,
    pub number: f64,
    pub operation: Option<Operator>,
    pub created_at: i64,
    pub updated_at: i64,
    pub user: AuthorView,
}

impl From<EvaluatedPost> for NodeView {
    fn from(value: EvaluatedPost) -> Self {
        let EvaluatedPost { post, value } = value;
        Self {
            id: post.id,
            number: value,
            operation: post.operator,
            created_at: post.created_at,
            updated_at: post.updated_at,
            user: post.owner.into(),
        }
    }
}

/// One page of posts plus how many are left after it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageView {
    pub posts: Vec<NodeView>,
    pub left: u64,
}

impl From<Page<EvaluatedPost>> for PageView {
    fn from(value: Page<EvaluatedPost>) -> Self {
        Self {
            posts: value.items.into_iter().map(NodeView::from).collect(),
            left: value.remaining,
        }
    }
}

/// Unpaged post list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostListView {
    pub posts: Vec<NodeView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountView {
    pub count: u64,
}

/// Registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub name: String,
    pub username: String,
    pub email: String,
    pub created_at: i64,
}

impl From<User> for UserView {
    fn from(value: User) -> Self {
        Self {
            id: value.id,
            name: value.name,
            username: value.username,
            email: value.email,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// `POST posts` body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostBody {
    pub number: f64,
    #[serde(default)]
    pub operator: Option<Operator>,
    #[serde(default)]
    pub parent_post_id: Option<PostId>,
}

/// `PUT posts/{id}` body.
///
/// An absent `operator` keeps the stored one; `"operator": null` clears it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdatePostBody {
    #[serde(default)]
    pub number: Option<f64>,
    #[serde(default, deserialize_with = "present_nullable")]
    pub operator: Option<Option<Operator>>,
}

impl UpdatePostBody {
    pub fn into_patch(self) -> PostPatch {
        PostPatch {
            number: self.number,
            operator: self.operator,
        }
    }
}

/// `POST users` body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisterUserBody {
    pub name: String,
    pub username: String,
    pub email: String,
}

// Only runs when the key is present, so `null` becomes `Some(None)`.
fn present_nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
