//! Cache configuration types.

use crate::error::{CacheError, CacheResult};
use std::time::Duration;

/// Default number of shards.
pub const DEFAULT_SHARDS: usize = 16;

/// Cache configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Upper bound on cached flags; least recently used flags are evicted
    /// past it. `None` means unbounded.
    pub max_entries: Option<usize>,

    /// Age after which an entry is reported as expired. Expired entries are
    /// still served.
    pub ttl: Option<Duration>,

    /// Number of independently locked shards
    pub shards: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: None,
            ttl: None,
            shards: DEFAULT_SHARDS,
        }
    }
}

impl CacheConfig {
    /// Create a new unbounded configuration without a TTL.
    ///
    /// # Examples
    ///
    /// ```
    /// use flagstore_cache::CacheConfig;
    /// use std::time::Duration;
    ///
    /// let config = CacheConfig::new()
    ///     .with_max_entries(10_000)
    ///     .with_ttl(Duration::from_secs(300));
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of entries.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    /// Set the TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Set the shard count.
    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    pub fn validate(&self) -> CacheResult<()> {
        if self.shards == 0 {
            return Err(CacheError::Config("shards must be at least 1".to_string()));
        }
        if self.max_entries == Some(0) {
            return Err(CacheError::Config(
                "max_entries must be at least 1".to_string(),
            ));
        }
        if self.ttl == Some(Duration::ZERO) {
            return Err(CacheError::Config("ttl must be non-zero".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.max_entries, None);
        assert_eq!(config.ttl, None);
        assert_eq!(config.shards, DEFAULT_SHARDS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero() {
        assert!(CacheConfig::new().with_shards(0).validate().is_err());
        assert!(CacheConfig::new().with_max_entries(0).validate().is_err());
        assert!(CacheConfig::new().with_ttl(Duration::ZERO).validate().is_err());
    }
}
