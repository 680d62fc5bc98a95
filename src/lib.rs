//! flagstore: feature flag evaluation backed by Redis.
//!
//! The workspace crates do the work:
//!
//! - [`flagstore_core`]: flag model, contexts and the evaluator
//! - [`flagstore_cache`]: sharded local flag cache
//! - [`flagstore_redis`]: Redis pool, commands and pub/sub
//! - [`flagstore_store`]: the flag store trait with Redis and in-memory backends
//! - [`flagstore_client`]: the client facade and its update listener
//! - [`flagstore_config`]: layered configuration loading
//!
//! This crate adds the HTTP API, the CLI, settings and logging setup.
//!
//! ```no_run
//! use flagstore::{AppState, Server, handlers};
//! use flagstore_client::{Client, ClientConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> flagstore::Result<()> {
//! let client = Client::connect(ClientConfig::builder().sdk_key("sdk-key").build()).await?;
//! let state = Arc::new(AppState::new(Some(Arc::new(client)), "demo"));
//! let listener = Server::bind(8080).await?;
//! Server::new(handlers::router(state))
//!     .serve(listener, async { let _ = tokio::signal::ctrl_c().await; })
//!     .await
//! # }
//! ```

pub mod cli;
pub mod error;
pub mod handlers;
pub mod http;
pub mod logging;
pub mod routing;
pub mod seed;
pub mod server;
pub mod settings;

pub use error::{Error, Result};
pub use handlers::AppState;
pub use http::{HttpRequest, HttpResponse};
pub use routing::{Route, Router};
pub use server::Server;
pub use settings::Settings;

pub use flagstore_cache;
pub use flagstore_client;
pub use flagstore_config;
pub use flagstore_core;
pub use flagstore_redis;
pub use flagstore_store;
