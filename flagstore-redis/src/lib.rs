//! # flagstore-redis
//!
//! Redis plumbing for the flag store: pooled connections, timed commands
//! and pub/sub subscriptions.
//!
//! ## Features
//!
//! - **Connection Pooling**: connection management with bb8, eager or lazy
//! - **Command Timeouts**: every command is bounded by `command_timeout`
//! - **Pub/Sub**: channel subscriptions that end when the connection drops
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flagstore_redis::{RedisConfig, RedisService};
//!
//! # async fn example() -> flagstore_redis::Result<()> {
//! let config = RedisConfig::builder()
//!     .url("redis://localhost:6379")
//!     .pool_size(4)
//!     .build();
//!
//! let redis = RedisService::new(config).await?;
//! let raw: Option<String> = redis.hget("flagstore:features", "dark-mode").await?;
//!
//! let mut changes = redis.pubsub()?.subscribe("flagstore:changes").await?;
//! while let Some(message) = changes.recv().await {
//!     println!("{}: {}", message.channel, message.payload);
//! }
//! # let _ = raw;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod pool;
mod pubsub;
mod service;

pub use config::{RedisConfig, RedisConfigBuilder};
pub use error::{RedisError, Result};
pub use pool::{RedisPool, RedisPoolBuilder};
pub use pubsub::{Message, PubSub, Subscription};
pub use service::RedisService;

// Re-export redis crate for convenience
pub use redis;
