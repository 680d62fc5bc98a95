//! Configuration loading for flagstore.
//!
//! A [`ConfigManager`] collects flat key/value settings from JSON, TOML and
//! `.env` files and from prefixed environment variables, then deserializes
//! them into a typed settings struct checked by [`Validate`].
//!
//! ```
//! use flagstore_config::{ConfigManager, ConfigValidator, Validate, Result};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Settings {
//!     #[serde(deserialize_with = "flagstore_config::de::number")]
//!     port: u16,
//! }
//!
//! impl Validate for Settings {
//!     fn validate(&self) -> Result<()> {
//!         ConfigValidator::is_port(self.port, "port")
//!     }
//! }
//!
//! let config = ConfigManager::with_prefix("DEMO");
//! config.load_env_from([("DEMO_PORT".to_string(), "8080".to_string())]);
//! let settings: Settings = config.load_validated().unwrap();
//! assert_eq!(settings.port, 8080);
//! ```

pub mod de;
pub mod env;
pub mod error;
pub mod loader;
pub mod manager;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use manager::ConfigManager;
pub use validation::{ConfigValidator, Validate};
