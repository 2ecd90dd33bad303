//! Database error types.

use thiserror::Error;

use crate::validation::ValidationError;

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// SQLx error (connection, query, etc.)
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Record not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Record already exists, or a uniqueness constraint rejected the write
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    /// Record is in a state that forbids the requested write
    #[error("{entity} {id} cannot be modified: {reason}")]
    InvalidState {
        entity: &'static str,
        id: String,
        reason: String,
    },

    /// Input rejected before reaching the database
    #[error("invalid input: {0}")]
    Invalid(#[from] ValidationError),
}

impl DatabaseError {
    /// Map a unique-constraint violation to [`DatabaseError::AlreadyExists`].
    ///
    /// Any other error is wrapped unchanged.
    pub(crate) fn unique_or_sqlx(err: sqlx::Error, entity: &'static str, id: String) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists { entity, id };
            }
        }
        DatabaseError::Sqlx(err)
    }

    /// Whether SQLite refused the statement because another connection holds
    /// a conflicting lock (`SQLITE_BUSY` or `SQLITE_LOCKED`, any extended code).
    pub fn is_lock_contention(&self) -> bool {
        let DatabaseError::Sqlx(sqlx::Error::Database(db_err)) = self else {
            return false;
        };
        db_err
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
    }
}

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
