//! User directory repository.
//!
//! # Responsibility
//! - Register and look up post authors.
//!
//! # Invariants
//! - Emails are stored lowercased and are unique.

use crate::db::DbError;
use crate::model::user::{NewUser, User, UserId, UserValidationError};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

const USER_SELECT_SQL: &str = "SELECT
    id,
    name,
    username,
    email,
    created_at
FROM users";

pub type UserRepoResult<T> = Result<T, UserRepoError>;

/// Errors from user directory operations.
#[derive(Debug)]
pub enum UserRepoError {
    Db(DbError),
    Validation(UserValidationError),
    NotFound(UserId),
    EmailTaken(String),
}

impl Display for UserRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "user not found: {id}"),
            Self::EmailTaken(email) => write!(f, "email already registered: {email}"),
        }
    }
}

impl Error for UserRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::NotFound(_) => None,
            Self::EmailTaken(_) => None,
        }
    }
}

impl From<DbError> for UserRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for UserRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<UserValidationError> for UserRepoError {
    fn from(value: UserValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Repository interface for the user directory.
pub trait UserRepository {
    fn create_user(&self, user: &NewUser) -> UserRepoResult<User>;
    fn get_user(&self, id: UserId) -> UserRepoResult<User>;
    fn find_by_email(&self, email: &str) -> UserRepoResult<Option<User>>;
}

/// SQLite-backed user directory.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &NewUser) -> UserRepoResult<User> {
        let user = user.normalized()?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if self.find_by_email(&user.email)?.is_some() {
            return Err(UserRepoError::EmailTaken(user.email));
        }

        tx.execute(
            "INSERT INTO users (name, username, email) VALUES (?1, ?2, ?3);",
            params![user.name, user.username, user.email],
        )?;
        let created = self.get_user(tx.last_insert_rowid())?;
        tx.commit()?;
        Ok(created)
    }

    fn get_user(&self, id: UserId) -> UserRepoResult<User> {
        self.conn
            .query_row(&format!("{USER_SELECT_SQL} WHERE id = ?1;"), [id], parse_user_row)
            .optional()?
            .ok_or(UserRepoError::NotFound(id))
    }

    fn find_by_email(&self, email: &str) -> UserRepoResult<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("{USER_SELECT_SQL} WHERE email = ?1;"),
                [email.trim().to_ascii_lowercase()],
                parse_user_row,
            )
            .optional()?;
        Ok(user)
    }
}

fn parse_user_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
        username: row.get("username")?,
        email: row.get("email")?,
        created_at: row.get("created_at")?,
    })
}
