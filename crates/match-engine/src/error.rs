//! Error types for matching operations.

use database::{DatabaseError, MatchStatus};
use thiserror::Error;

/// Errors that can occur while scoring, pre-filtering or managing matches.
#[derive(Debug, Error)]
pub enum MatchError {
    /// Request failed a precondition (same client twice, same gender, ...).
    #[error("invalid request: {0}")]
    Validation(String),

    /// A client is not available for a new match.
    #[error("client {client_id} is already matched or unavailable")]
    AlreadyMatched { client_id: i64 },

    /// The state machine does not allow this transition.
    #[error("illegal status transition: {from} -> {to}")]
    IllegalTransition { from: MatchStatus, to: MatchStatus },

    /// The caller's view of the record's status is out of date.
    #[error("status mismatch: expected {expected}, found {actual}")]
    StatusMismatch {
        expected: MatchStatus,
        actual: MatchStatus,
    },

    /// A concurrent writer won; the storage layer rejected this write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Candidate cache could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage failure.
    #[error("database error: {0}")]
    Database(DatabaseError),
}

impl MatchError {
    /// Whether a concurrent writer got there first. Callers may retry or
    /// report the client as taken.
    pub fn is_conflict(&self) -> bool {
        matches!(self, MatchError::Conflict(_))
    }

    /// Whether the request was rejected before anything was written.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            MatchError::Validation(_)
                | MatchError::AlreadyMatched { .. }
                | MatchError::IllegalTransition { .. }
                | MatchError::StatusMismatch { .. }
                | MatchError::NotFound { .. }
        )
    }
}

impl From<DatabaseError> for MatchError {
    fn from(err: DatabaseError) -> Self {
        if err.is_lock_contention() {
            return MatchError::Conflict(format!("concurrent write in progress: {}", err));
        }
        match err {
            DatabaseError::AlreadyExists { entity, id } => {
                MatchError::Conflict(format!("{} already taken: {}", entity, id))
            }
            DatabaseError::NotFound { entity, id } => MatchError::NotFound { entity, id },
            other => MatchError::Database(other),
        }
    }
}

/// Result type for matching operations.
pub type Result<T> = std::result::Result<T, MatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_errors_are_classified() {
        let err: MatchError = DatabaseError::AlreadyExists {
            entity: "Partner link",
            id: "7".to_string(),
        }
        .into();
        assert!(err.is_conflict());
        assert!(!err.is_precondition());

        let err: MatchError = DatabaseError::NotFound {
            entity: "Client",
            id: "7".to_string(),
        }
        .into();
        assert!(matches!(err, MatchError::NotFound { entity: "Client", .. }));
        assert!(err.is_precondition());

        let err: MatchError = DatabaseError::InvalidState {
            entity: "Client",
            id: "1".to_string(),
            reason: "status is matched".to_string(),
        }
        .into();
        assert!(matches!(err, MatchError::Database(_)));

        let err: MatchError = DatabaseError::Sqlx(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(err, MatchError::Database(_)));
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_error_display() {
        let err = MatchError::IllegalTransition {
            from: MatchStatus::Married,
            to: MatchStatus::Dating,
        };
        assert_eq!(err.to_string(), "illegal status transition: married -> dating");
    }
}
