//! Boundary configuration resolved from the process environment.
//!
//! # Invariants
//! - Blank variables count as unset.
//! - Logging stays off unless a log directory is configured.

use calcforum_core::{default_log_level, init_logging, LoggingError};
use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "CALCFORUM_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "CALCFORUM_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "CALCFORUM_LOG_DIR";

const DEFAULT_DB_FILE_NAME: &str = "calcforum.sqlite3";

/// Resolved boundary settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
}

impl ApiConfig {
    /// Reads settings from `std::env`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            db_path: read(DB_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME)),
            log_level: read(LOG_LEVEL_ENV).unwrap_or_else(|| default_log_level().to_string()),
            log_dir: read(LOG_DIR_ENV).map(PathBuf::from),
        }
    }

    /// Config pointing at an explicit database file, other fields default.
    pub fn with_db_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::from_lookup(|_| None)
        }
    }

    /// Starts file logging when a directory is configured.
    ///
    /// Returns `Ok(false)` when logging is left off.
    pub fn init_logging(&self) -> Result<bool, LoggingError> {
        let Some(log_dir) = &self.log_dir else {
            return Ok(false);
        };
        init_logging(&self.log_level, &log_dir.to_string_lossy())?;
        Ok(true)
    }
}
