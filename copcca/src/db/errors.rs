use thiserror::Error;

/// Unified error type for storage operations that application code can handle
#[derive(Error, Debug)]
pub enum DbError {
    /// Entity not found by the given identifier
    #[error("Entity not found")]
    NotFound,

    /// A document with the same unique key already exists
    #[error("Unique constraint violation on {key}")]
    UniqueViolation {
        key: String,
        /// The conflicting value that caused the violation
        conflicting_value: Option<String>,
    },

    /// A stored document did not match the shape the caller expected
    #[error("Stored document could not be decoded: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound,
            other => DbError::Other(anyhow::Error::from(other)),
        }
    }
}

/// Type alias for storage operation results
pub type Result<T> = std::result::Result<T, DbError>;
