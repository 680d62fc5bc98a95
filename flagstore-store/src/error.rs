//! Error types for store operations.

use flagstore_redis::RedisError;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backend cannot be reached. Callers keep serving cached data.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A definition or event could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The backend rejected the operation.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Check if retrying later may succeed.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        if err.is_retryable() {
            Self::Unavailable(err.to_string())
        } else if let RedisError::Serialization(msg) = err {
            Self::Serialization(msg)
        } else {
            Self::Backend(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
