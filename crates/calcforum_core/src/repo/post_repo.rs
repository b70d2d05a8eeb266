//! Post tree repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist posts as an adjacency list plus a materialized closure table.
//! - Answer ancestor, child, and count queries without scanning the tree.
//! - Keep SQL details and ordering behavior inside repository boundary.
//!
//! # Invariants
//! - `post_closure` holds every (ancestor, descendant) pair, self included at
//!   depth 0, so ancestor chains come from one indexed query.
//! - Child listing is deterministic: `created_at DESC, id DESC`.
//! - Create, update, and subtree delete each run in one `IMMEDIATE`
//!   transaction; readers see either the old or the new tree.
//! - Write paths validate post shape before SQL mutations; read paths reject
//!   invalid persisted state instead of masking it.

use crate::db::migrations::latest_version;
use crate::db::{DbError, NOW_EPOCH_MS_SQL};
use crate::model::post::{
    validate_shape, Author, NewPost, Operator, Post, PostId, PostPatch, PostValidationError,
};
use crate::model::user::UserId;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

const POST_SELECT_SQL: &str = "SELECT
    p.id AS id,
    p.number AS number,
    p.operator AS operator,
    p.parent_id AS parent_id,
    p.owner_id AS owner_id,
    u.name AS owner_name,
    u.email AS owner_email,
    p.created_at AS created_at,
    p.updated_at AS updated_at
FROM posts p
INNER JOIN users u ON u.id = p.owner_id";

/// Result type used by post repository operations.
pub type PostRepoResult<T> = Result<T, PostRepoError>;

/// Errors from post repository operations.
#[derive(Debug)]
pub enum PostRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Write input violates post shape rules.
    Validation(PostValidationError),
    /// Target post does not exist.
    PostNotFound(PostId),
    /// Requested parent post does not exist.
    ParentNotFound(PostId),
    /// Owner is not a known user.
    UserNotFound(UserId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to valid read model.
    InvalidData(String),
}

impl Display for PostRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::PostNotFound(id) => write!(f, "post not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent post not found: {id}"),
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "post repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "post repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid post data: {message}"),
        }
    }
}

impl Error for PostRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for PostRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for PostRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<PostValidationError> for PostRepoError {
    fn from(value: PostValidationError) -> Self {
        Self::Validation(value)
    }
}

/// One ordered slice of a child set plus the set size, read from the same
/// snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildWindow {
    pub items: Vec<Post>,
    pub total: u64,
}

/// Repository interface for the post tree.
///
/// `parent_id: None` addresses the root set wherever a parent is taken.
pub trait PostRepository {
    /// Creates one post and links it under its parent.
    fn create_post(&self, new_post: &NewPost) -> PostRepoResult<Post>;
    /// Loads one post by id.
    fn get_post(&self, id: PostId) -> PostRepoResult<Post>;
    /// Loads the root-to-post path, inclusive, root first.
    fn ancestor_chain(&self, id: PostId) -> PostRepoResult<Vec<Post>>;
    /// Loads the direct parent; `None` for roots.
    fn parent_of(&self, id: PostId) -> PostRepoResult<Option<Post>>;
    /// Lists direct children, newest first.
    fn list_children(&self, parent_id: Option<PostId>) -> PostRepoResult<Vec<Post>>;
    /// Counts direct children.
    fn count_children(&self, parent_id: Option<PostId>) -> PostRepoResult<u64>;
    /// Reads one ordered slice of direct children together with their count.
    fn list_children_window(
        &self,
        parent_id: Option<PostId>,
        offset: u64,
        limit: u32,
    ) -> PostRepoResult<ChildWindow>;
    /// Lists roots started by one user, newest first.
    fn list_roots_by_owner(&self, owner_id: UserId) -> PostRepoResult<Vec<Post>>;
    /// Applies a partial update and returns the stored result.
    fn update_post(&self, id: PostId, patch: &PostPatch) -> PostRepoResult<Post>;
    /// Deletes one post and its whole subtree; returns removed row count.
    fn delete_post(&self, id: PostId) -> PostRepoResult<u64>;
}

/// SQLite-backed post tree repository.
pub struct SqlitePostRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePostRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> PostRepoResult<Self> {
        ensure_post_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl PostRepository for SqlitePostRepository<'_> {
    fn create_post(&self, new_post: &NewPost) -> PostRepoResult<Post> {
        new_post.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !user_exists(&tx, new_post.owner_id)? {
            return Err(PostRepoError::UserNotFound(new_post.owner_id));
        }
        if let Some(parent_id) = new_post.parent_id {
            if !post_exists(&tx, parent_id)? {
                return Err(PostRepoError::ParentNotFound(parent_id));
            }
        }

        tx.execute(
            "INSERT INTO posts (number, operator, parent_id, owner_id)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                new_post.number,
                new_post.operator.map(Operator::symbol),
                new_post.parent_id,
                new_post.owner_id,
            ],
        )?;
        let id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO post_closure (ancestor_id, descendant_id, depth)
             SELECT ancestor_id, ?1, depth + 1
             FROM post_closure
             WHERE descendant_id = ?2
             UNION ALL
             SELECT ?1, ?1, 0;",
            params![id, new_post.parent_id],
        )?;

        let post = load_required_post(&tx, id)?;
        tx.commit()?;
        Ok(post)
    }

    fn get_post(&self, id: PostId) -> PostRepoResult<Post> {
        load_required_post(self.conn, id)
    }

    fn ancestor_chain(&self, id: PostId) -> PostRepoResult<Vec<Post>> {
        let mut stmt = self.conn.prepare(&format!(
            "{POST_SELECT_SQL}
             INNER JOIN post_closure c ON c.ancestor_id = p.id
             WHERE c.descendant_id = ?1
             ORDER BY c.depth DESC;"
        ))?;
        let chain = collect_posts(stmt.query([id])?)?;
        if chain.is_empty() {
            return Err(PostRepoError::PostNotFound(id));
        }
        if chain[0].parent_id.is_some() {
            return Err(PostRepoError::InvalidData(format!(
                "ancestor chain of post {id} does not start at a root"
            )));
        }
        Ok(chain)
    }

    fn parent_of(&self, id: PostId) -> PostRepoResult<Option<Post>> {
        let post = load_required_post(self.conn, id)?;
        match post.parent_id {
            Some(parent_id) => load_optional_post(self.conn, parent_id)?
                .map(Some)
                .ok_or_else(|| {
                    PostRepoError::InvalidData(format!(
                        "post {id} references missing parent {parent_id}"
                    ))
                }),
            None => Ok(None),
        }
    }

    fn list_children(&self, parent_id: Option<PostId>) -> PostRepoResult<Vec<Post>> {
        ensure_parent_exists(self.conn, parent_id)?;
        let mut stmt = self.conn.prepare(&format!(
            "{POST_SELECT_SQL}
             WHERE p.parent_id IS ?1
             ORDER BY p.created_at DESC, p.id DESC;"
        ))?;
        let posts = collect_posts(stmt.query([parent_id])?)?;
        Ok(posts)
    }

    fn count_children(&self, parent_id: Option<PostId>) -> PostRepoResult<u64> {
        ensure_parent_exists(self.conn, parent_id)?;
        count_direct_children(self.conn, parent_id)
    }

    fn list_children_window(
        &self,
        parent_id: Option<PostId>,
        offset: u64,
        limit: u32,
    ) -> PostRepoResult<ChildWindow> {
        // Deferred read transaction: slice and count share one snapshot.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Deferred)?;
        ensure_parent_exists(&tx, parent_id)?;

        let offset = i64::try_from(offset).map_err(|_| {
            PostRepoError::InvalidData(format!("page offset {offset} is out of range"))
        })?;
        let items = {
            let mut stmt = tx.prepare(&format!(
                "{POST_SELECT_SQL}
                 WHERE p.parent_id IS ?1
                 ORDER BY p.created_at DESC, p.id DESC
                 LIMIT ?2 OFFSET ?3;"
            ))?;
            let rows = stmt.query(params![parent_id, i64::from(limit), offset])?;
            let posts = collect_posts(rows)?;
            posts
        };
        let total = count_direct_children(&tx, parent_id)?;

        tx.commit()?;
        Ok(ChildWindow { items, total })
    }

    fn list_roots_by_owner(&self, owner_id: UserId) -> PostRepoResult<Vec<Post>> {
        if !user_exists(self.conn, owner_id)? {
            return Err(PostRepoError::UserNotFound(owner_id));
        }
        let mut stmt = self.conn.prepare(&format!(
            "{POST_SELECT_SQL}
             WHERE p.owner_id = ?1
               AND p.parent_id IS NULL
             ORDER BY p.created_at DESC, p.id DESC;"
        ))?;
        let posts = collect_posts(stmt.query([owner_id])?)?;
        Ok(posts)
    }

    fn update_post(&self, id: PostId, patch: &PostPatch) -> PostRepoResult<Post> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let current = load_required_post(&tx, id)?;
        let (number, operator) = patch.merged(&current);
        validate_shape(current.parent_id.is_some(), number, operator)?;

        tx.execute(
            &format!(
                "UPDATE posts
                 SET number = ?2,
                     operator = ?3,
                     updated_at = {NOW_EPOCH_MS_SQL}
                 WHERE id = ?1;"
            ),
            params![id, number, operator.map(Operator::symbol)],
        )?;

        let post = load_required_post(&tx, id)?;
        tx.commit()?;
        Ok(post)
    }

    fn delete_post(&self, id: PostId) -> PostRepoResult<u64> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !post_exists(&tx, id)? {
            return Err(PostRepoError::PostNotFound(id));
        }

        // Deepest first so no single delete cascades through a long chain.
        let doomed = {
            let mut stmt = tx.prepare(
                "SELECT descendant_id
                 FROM post_closure
                 WHERE ancestor_id = ?1
                 ORDER BY depth DESC, descendant_id DESC;",
            )?;
            let ids = stmt
                .query_map([id], |row| row.get::<_, PostId>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };
        let mut removed = 0_u64;
        {
            let mut stmt = tx.prepare("DELETE FROM posts WHERE id = ?1;")?;
            for doomed_id in doomed {
                removed += stmt.execute([doomed_id])? as u64;
            }
        }

        tx.commit()?;
        Ok(removed)
    }
}

fn load_optional_post(conn: &Connection, id: PostId) -> PostRepoResult<Option<Post>> {
    let mut stmt = conn.prepare(&format!("{POST_SELECT_SQL} WHERE p.id = ?1;"))?;
    let mut rows = stmt.query([id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_post_row(row)?));
    }
    Ok(None)
}

fn load_required_post(conn: &Connection, id: PostId) -> PostRepoResult<Post> {
    load_optional_post(conn, id)?.ok_or(PostRepoError::PostNotFound(id))
}

fn collect_posts(mut rows: rusqlite::Rows<'_>) -> PostRepoResult<Vec<Post>> {
    let mut posts = Vec::new();
    while let Some(row) = rows.next()? {
        posts.push(parse_post_row(row)?);
    }
    Ok(posts)
}

fn count_direct_children(conn: &Connection, parent_id: Option<PostId>) -> PostRepoResult<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*)
         FROM posts
         WHERE parent_id IS ?1;",
        [parent_id],
        |row| row.get(0),
    )?;
    u64::try_from(count)
        .map_err(|_| PostRepoError::InvalidData(format!("negative child count {count}")))
}

fn ensure_parent_exists(conn: &Connection, parent_id: Option<PostId>) -> PostRepoResult<()> {
    match parent_id {
        Some(parent_id) if !post_exists(conn, parent_id)? => {
            Err(PostRepoError::PostNotFound(parent_id))
        }
        _ => Ok(()),
    }
}

fn post_exists(conn: &Connection, id: PostId) -> PostRepoResult<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM posts WHERE id = ?1;", [id], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

fn user_exists(conn: &Connection, id: UserId) -> PostRepoResult<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM users WHERE id = ?1;", [id], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

fn parse_post_row(row: &Row<'_>) -> PostRepoResult<Post> {
    let id: PostId = row.get("id")?;
    let operator = match row.get::<_, Option<String>>("operator")? {
        Some(value) => Some(Operator::from_symbol(&value).ok_or_else(|| {
            PostRepoError::InvalidData(format!("invalid operator `{value}` in posts.operator"))
        })?),
        None => None,
    };

    let post = Post {
        id,
        number: row.get("number")?,
        operator,
        parent_id: row.get("parent_id")?,
        owner: Author {
            id: row.get("owner_id")?,
            name: row.get("owner_name")?,
            email: row.get("owner_email")?,
        },
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    post.validate()
        .map_err(|err| PostRepoError::InvalidData(format!("post {id}: {err}")))?;
    Ok(post)
}

fn ensure_post_connection_ready(conn: &Connection) -> PostRepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(PostRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in ["users", "posts", "post_closure"] {
        if !table_exists(conn, table)? {
            return Err(PostRepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> PostRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
