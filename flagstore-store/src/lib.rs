//! Flag store adapters for flagstore
//!
//! The [`FlagStore`] trait is the persistent source of flag definitions.
//! Two implementations are provided:
//!
//! - [`RedisFlagStore`] - definitions in a Redis hash, changes over pub/sub
//! - [`MemoryFlagStore`] - in-process, for offline demos and tests
//!
//! Writes are versioned: a definition only replaces a strictly older one.
//!
//! ```
//! use flagstore_core::FlagDefinition;
//! use flagstore_store::{FlagStore, MemoryFlagStore};
//!
//! # tokio_test::block_on(async {
//! let store = MemoryFlagStore::new();
//! store.put(&FlagDefinition::boolean("dark-mode", true).with_version(2)).await?;
//!
//! // Older versions are ignored
//! let written = store.put(&FlagDefinition::boolean("dark-mode", false)).await?;
//! assert!(!written);
//! # Ok::<(), flagstore_store::StoreError>(())
//! # }).unwrap();
//! ```

pub mod error;
pub mod memory;
pub mod redis_store;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryFlagStore;
pub use redis_store::{DEFAULT_PREFIX, RedisFlagStore};
pub use traits::{ChangeEvent, ChangeStream, FlagStore};
