//! Offset paging over the root set or one post's direct children.
//!
//! # Invariants
//! - Page size is fixed at [`PAGE_SIZE`]; page indices are zero-based.
//! - Items are ordered `created_at DESC, id DESC`.
//! - `remaining = max(0, total - (page_index + 1) * PAGE_SIZE)`, with `total`
//!   recounted on every call in the same snapshot as the slice.
//! - An out-of-range page is empty with `remaining = 0`, not an error.

use crate::model::post::{Post, PostId};
use crate::repo::post_repo::{PostRepoResult, PostRepository};

/// Items per page.
pub const PAGE_SIZE: u32 = 10;

/// One page of an ordered collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Items left after this page.
    pub remaining: u64,
}

impl<T> Page<T> {
    /// Transforms items while keeping `remaining`.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<Result<_, _>>()?,
            remaining: self.remaining,
        })
    }
}

/// Offset of the first item on `page_index`.
pub fn page_offset(page_index: u32) -> u64 {
    u64::from(page_index) * u64::from(PAGE_SIZE)
}

/// Items left after `page_index` in a collection of `total`.
pub fn remaining_after(total: u64, page_index: u32) -> u64 {
    total.saturating_sub(page_offset(page_index) + u64::from(PAGE_SIZE))
}

/// Reads one page of roots (`collection = None`) or of a post's replies.
pub fn get_page<R: PostRepository>(
    repo: &R,
    collection: Option<PostId>,
    page_index: u32,
) -> PostRepoResult<Page<Post>> {
    let window = repo.list_children_window(collection, page_offset(page_index), PAGE_SIZE)?;
    Ok(Page {
        items: window.items,
        remaining: remaining_after(window.total, page_index),
    })
}
