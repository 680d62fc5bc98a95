//! Flag store trait definition.

use async_trait::async_trait;
use flagstore_core::FlagDefinition;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::StoreResult;

/// Notification that a flag changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub key: String,
    pub version: u64,
}

impl ChangeEvent {
    pub fn new(key: impl Into<String>, version: u64) -> Self {
        Self {
            key: key.into(),
            version,
        }
    }

    pub fn for_flag(definition: &FlagDefinition) -> Self {
        Self::new(definition.key.clone(), definition.version)
    }

    /// Event announcing that `definition` left the store.
    ///
    /// The version is one past the removed one, so listeners that have
    /// cached it re-fetch and find nothing.
    pub fn removal(definition: &FlagDefinition) -> Self {
        Self::new(definition.key.clone(), definition.version.saturating_add(1))
    }
}

/// Stream of change events. It ends when the underlying connection drops;
/// callers subscribe again to resume.
pub type ChangeStream = BoxStream<'static, ChangeEvent>;

/// Persistent source of flag definitions.
#[async_trait]
pub trait FlagStore: Send + Sync {
    /// Get a flag definition, including tombstones.
    ///
    /// Returns `Ok(None)` if the key is unknown.
    async fn get(&self, key: &str) -> StoreResult<Option<FlagDefinition>>;

    /// Get every flag definition, keyed by flag key.
    async fn get_all(&self) -> StoreResult<HashMap<String, FlagDefinition>>;

    /// Versioned upsert.
    ///
    /// The write is skipped when the stored version is equal or newer.
    /// Returns whether the definition was written; a written definition is
    /// announced to subscribers.
    async fn put(&self, definition: &FlagDefinition) -> StoreResult<bool>;

    /// Subscribe to change events.
    async fn subscribe(&self) -> StoreResult<ChangeStream>;

    /// Whether a full data set has been written with [`init`](FlagStore::init).
    async fn is_initialized(&self) -> StoreResult<bool>;

    /// Replace the whole data set and mark the store initialized.
    ///
    /// Every written flag is announced, and so is every flag the new data
    /// set drops (see [`ChangeEvent::removal`]).
    async fn init(&self, definitions: Vec<FlagDefinition>) -> StoreResult<()>;

    /// Short backend name for logs and status output.
    fn name(&self) -> &'static str;
}
