//! Flag evaluation client for flagstore
//!
//! [`Client`] serves evaluations from a local cache that a background
//! update listener keeps in sync with the flag store.
//!
//! # Features
//!
//! - **No I/O on evaluation** - `variation` reads only the local cache
//! - **Streaming updates** - pub/sub change events with resync on reconnect
//! - **Polling fallback** - periodic reloads while the stream is down, or
//!   as the only update mode
//! - **Graceful degradation** - store outages serve the last known flags
//!
//! # Quick Start
//!
//! ```
//! use flagstore_client::{Client, ClientConfig};
//! use flagstore_core::{Context, FlagDefinition};
//! use flagstore_store::MemoryFlagStore;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(MemoryFlagStore::with_flags([
//!     FlagDefinition::boolean("new-checkout", true),
//! ]));
//!
//! let config = ClientConfig::builder().sdk_key("sdk-example-key").build();
//! let client = Client::initialize(config, store).await?;
//!
//! let ctx = Context::new("user-1");
//! assert!(client.bool_variation("new-checkout", &ctx, false));
//!
//! client.close().await;
//! # Ok::<(), flagstore_client::InitError>(())
//! # }).unwrap();
//! ```

pub mod backoff;
pub mod client;
pub mod config;
pub mod error;
pub mod listener;

pub use client::{Client, ClientStatus};
pub use config::{ClientConfig, ClientConfigBuilder, MIN_POLL_INTERVAL, UpdateMode, mask_key};
pub use error::{ClientError, InitError};
pub use listener::{ListenerConfig, ListenerHandle, ListenerState};
