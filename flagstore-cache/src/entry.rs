//! Cache entries.

use flagstore_core::FlagDefinition;
use std::time::Duration;
use tokio::time::Instant;

/// A cached flag definition.
///
/// Entries are replaced wholesale and never mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub definition: FlagDefinition,
    pub fetched_at_version: u64,
    pub fetched_at: Instant,
}

impl CacheEntry {
    pub fn new(definition: FlagDefinition) -> Self {
        Self {
            fetched_at_version: definition.version,
            definition,
            fetched_at: Instant::now(),
        }
    }

    /// Copy of this entry fetched now, for a store read that confirmed the
    /// cached version.
    pub fn renewed(&self) -> Self {
        Self {
            fetched_at: Instant::now(),
            ..self.clone()
        }
    }

    pub fn key(&self) -> &str {
        &self.definition.key
    }

    pub fn is_deleted(&self) -> bool {
        self.definition.deleted
    }

    /// Whether the entry is older than `ttl`. Without a TTL nothing expires.
    pub fn is_expired(&self, ttl: Option<Duration>) -> bool {
        ttl.is_some_and(|ttl| self.fetched_at.elapsed() >= ttl)
    }
}
