//! Local flag cache for flagstore
//!
//! Holds the flag definitions evaluations are served from. The cache is
//! split into shards, each with its own lock and LRU list, and keeps a
//! per-key version high-water mark so an older definition can never replace
//! a newer one, even after invalidation or eviction.
//!
//! # Examples
//!
//! ```
//! use flagstore_cache::*;
//! use flagstore_core::FlagDefinition;
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), CacheError> {
//! let cache = FlagCache::new(
//!     CacheConfig::new()
//!         .with_max_entries(1_000)
//!         .with_ttl(Duration::from_secs(60)),
//! )?;
//!
//! cache.put(FlagDefinition::boolean("dark-mode", true));
//!
//! if let Some(entry) = cache.lookup("dark-mode") {
//!     assert!(!cache.is_expired(&entry));
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod entry;
pub mod error;

pub use cache::{CacheStats, FlagCache, PutOutcome};
pub use config::{CacheConfig, DEFAULT_SHARDS};
pub use entry::CacheEntry;
pub use error::{CacheError, CacheResult};
