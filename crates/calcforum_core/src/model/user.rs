//! User directory model.
//!
//! Only the public identity is stored; credentials belong to the external
//! authentication collaborator.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Opaque actor id handed over by the authentication collaborator.
pub type UserId = i64;

/// Stored user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub username: String,
    pub email: String,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
}

/// Registration input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub email: String,
}

impl NewUser {
    pub fn new(
        name: impl Into<String>,
        username: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            username: username.into(),
            email: email.into(),
        }
    }

    /// Returns a trimmed copy, rejecting blank fields and malformed email.
    ///
    /// Email is lowercased so uniqueness is case-insensitive.
    pub fn normalized(&self) -> Result<Self, UserValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(UserValidationError::BlankName);
        }
        let username = self.username.trim();
        if username.is_empty() {
            return Err(UserValidationError::BlankUsername);
        }
        let email = self.email.trim().to_ascii_lowercase();
        let well_formed = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
        if !well_formed {
            return Err(UserValidationError::InvalidEmail(email));
        }
        Ok(Self {
            name: name.to_string(),
            username: username.to_string(),
            email,
        })
    }
}

/// Registration input errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserValidationError {
    BlankName,
    BlankUsername,
    InvalidEmail(String),
}

impl Display for UserValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "name must not be blank"),
            Self::BlankUsername => write!(f, "username must not be blank"),
            Self::InvalidEmail(value) => write!(f, "invalid email `{value}`"),
        }
    }
}

impl Error for UserValidationError {}
