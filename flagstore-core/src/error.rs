//! Evaluation error types.

use thiserror::Error;

/// Result type for evaluation.
pub type Result<T> = std::result::Result<T, EvalError>;

/// Reasons a context fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// The context key is empty.
    #[error("context key must not be empty")]
    EmptyKey,

    /// The context kind is empty, reserved, or contains invalid characters.
    #[error("invalid context kind: {0:?}")]
    InvalidKind(String),
}

/// Evaluation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// The context could not be evaluated.
    #[error("invalid context: {0}")]
    InvalidContext(#[from] ContextError),

    /// The flag references a variation that does not exist.
    #[error("malformed flag {flag_key}: {detail}")]
    MalformedFlag { flag_key: String, detail: String },
}

impl EvalError {
    pub(crate) fn malformed(flag_key: &str, detail: impl Into<String>) -> Self {
        Self::MalformedFlag {
            flag_key: flag_key.to_string(),
            detail: detail.into(),
        }
    }

    /// Check if the caller supplied the bad input.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidContext(_))
    }
}
