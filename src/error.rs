/// Error types for the pronofeed data layer
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Duplicate relation row (already liked/followed/subscribed/...).
    /// Benign: callers surface it as a notice, never as a failure.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ServiceError {
    /// Whether this error is an expected duplicate-membership outcome.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ServiceError::Conflict(_))
    }
}

/// Unique-violation (SQLSTATE 23505) becomes `Conflict`; everything else
/// stays a database error.
impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.code().as_deref() == Some("23505") {
                return ServiceError::Conflict(db_err.message().to_string());
            }
        }
        ServiceError::Database(err)
    }
}

/// Result type alias for data-layer operations
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ServiceError::InvalidInput("empty comment".to_string());
        assert_eq!(err.to_string(), "Invalid input: empty comment");

        let err = ServiceError::Conflict("already liked".to_string());
        assert_eq!(err.to_string(), "Conflict: already liked");
        assert!(err.is_conflict());
    }

    #[test]
    fn test_non_conflict() {
        assert!(!ServiceError::NotAuthenticated.is_conflict());
        assert!(!ServiceError::NotFound("profile".into()).is_conflict());
    }
}
