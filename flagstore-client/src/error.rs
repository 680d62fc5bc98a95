//! Client error types.

use flagstore_cache::CacheError;
use flagstore_store::StoreError;
use thiserror::Error;

/// Errors raised while building a client.
///
/// A store that is unreachable or slow to load is not an error: the client
/// starts uninitialized and keeps retrying in the background.
#[derive(Debug, Error)]
pub enum InitError {
    /// No SDK key was configured and the client is not offline.
    #[error("SDK key is required unless the client is offline")]
    MissingSdkKey,

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The store could not be constructed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<CacheError> for InitError {
    fn from(err: CacheError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Errors from changing a running client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("Offline clients have no update listener")]
    Offline,

    #[error("Client is closed")]
    Closed,
}
