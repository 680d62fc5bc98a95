//! Server error type.

use flagstore_client::{ClientError, InitError};
use flagstore_config::ConfigError;
use flagstore_core::EvalError;
use flagstore_store::StoreError;
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("{message}")]
    ServiceUnavailable {
        message: String,
        flag_key: Option<String>,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Invalid seed file: {0}")]
    Seed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Client initialization failed: {0}")]
    Init(#[from] InitError),

    #[error("Flag client unavailable: {0}")]
    Client(#[from] ClientError),

    #[error("Flag store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn not_initialized(flag_key: Option<&str>) -> Self {
        Self::ServiceUnavailable {
            message: "Flag client not initialized".to_string(),
            flag_key: flag_key.map(str::to_string),
        }
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::RouteNotFound(_) => 404,
            Error::MethodNotAllowed(_) => 405,
            Error::BadRequest(_) => 400,
            Error::PayloadTooLarge { .. } => 413,
            Error::ServiceUnavailable { .. } | Error::Client(_) => 503,
            Error::Store(e) if e.is_unavailable() => 503,
            _ => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// JSON body sent for this error.
    pub fn to_body(&self) -> Value {
        let mut body = json!({
            "error": self.to_string(),
            "status": self.status_code(),
        });
        if let Error::ServiceUnavailable {
            flag_key: Some(flag_key),
            ..
        } = self
        {
            body["flagKey"] = Value::String(flag_key.clone());
        }
        body
    }
}

impl From<EvalError> for Error {
    fn from(err: EvalError) -> Self {
        if err.is_client_error() {
            Error::BadRequest(err.to_string())
        } else {
            Error::Internal(err.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use flagstore_core::ContextError;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::RouteNotFound("GET /x".into()).status_code(), 404);
        assert_eq!(Error::BadRequest("bad".into()).status_code(), 400);
        assert_eq!(Error::not_initialized(None).status_code(), 503);
        assert_eq!(Error::Internal("boom".into()).status_code(), 500);
        assert_eq!(
            Error::Store(StoreError::Unavailable("down".into())).status_code(),
            503
        );
        assert_eq!(Error::Store(StoreError::Backend("bad".into())).status_code(), 500);
        assert_eq!(Error::Client(ClientError::Closed).status_code(), 503);

        let err = Error::PayloadTooLarge { limit: 65536 };
        assert_eq!(err.status_code(), 413);
        assert!(err.is_client_error());
        assert_eq!(err.to_body()["error"], "Request body exceeds 65536 bytes");
    }

    #[test]
    fn test_invalid_context_is_bad_request() {
        let err: Error = EvalError::from(ContextError::EmptyKey).into();
        assert_eq!(err.status_code(), 400);
        assert!(err.is_client_error());
    }

    #[test]
    fn test_body_includes_flag_key() {
        let body = Error::not_initialized(Some("dark-mode")).to_body();
        assert_eq!(body["status"], 503);
        assert_eq!(body["flagKey"], "dark-mode");
        assert_eq!(body["error"], "Flag client not initialized");

        let body = Error::RouteNotFound("GET /nope".into()).to_body();
        assert_eq!(body["status"], 404);
        assert!(body.get("flagKey").is_none());
    }
}
