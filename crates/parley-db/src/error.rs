use rusqlite::ErrorCode;
use thiserror::Error;

/// Failure of a store operation, classified by what the caller can do about it.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed or missing input, or a relation from a user to themselves.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The record already exists (duplicate edge, duplicate pending request,
    /// sequence collision).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The acting user is not the party allowed to perform the mutation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The store was busy or unreachable within the deadline. Whether a retry
    /// is safe depends on the operation.
    #[error("storage unavailable: {0}")]
    Transient(String),

    #[error("storage error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Stable machine-readable name, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::Transient(_) => "transient",
            Self::Internal(_) => "internal",
        }
    }

    /// Replace the message of a `Conflict`, leaving other kinds untouched.
    pub(crate) fn conflict_as(self, message: impl Into<String>) -> Self {
        match self {
            Self::Conflict(_) => Self::Conflict(message.into()),
            other => other,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
                Self::Transient(e.to_string())
            }
            Some(ErrorCode::ConstraintViolation) => Self::Conflict(e.to_string()),
            _ => Self::Internal(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(format!("corrupt json column: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: ErrorCode) -> rusqlite::Error {
        let extended = match code {
            ErrorCode::DatabaseBusy => 5,
            ErrorCode::DatabaseLocked => 6,
            ErrorCode::ConstraintViolation => 19,
            _ => 1,
        };
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(extended), None)
    }

    #[test]
    fn busy_and_locked_are_transient() {
        assert!(matches!(
            StoreError::from(sqlite_failure(ErrorCode::DatabaseBusy)),
            StoreError::Transient(_)
        ));
        assert!(matches!(
            StoreError::from(sqlite_failure(ErrorCode::DatabaseLocked)),
            StoreError::Transient(_)
        ));
    }

    #[test]
    fn constraint_violation_is_conflict() {
        let err = StoreError::from(sqlite_failure(ErrorCode::ConstraintViolation));
        assert_eq!(err.kind(), "conflict");
        assert_eq!(err.conflict_as("already blocked").to_string(), "conflict: already blocked");
    }

    #[test]
    fn other_errors_are_internal() {
        let err = StoreError::from(rusqlite::Error::QueryReturnedNoRows);
        assert_eq!(err.kind(), "internal");
        assert_eq!(
            StoreError::NotFound("x".into()).conflict_as("y").kind(),
            "not_found"
        );
    }
}
