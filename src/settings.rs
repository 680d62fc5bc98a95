//! Application settings.
//!
//! Loaded with increasing precedence from built-in defaults, an optional
//! JSON/TOML/.env file, a `.env` file in the working directory and
//! `FLAGSTORE_*` environment variables. Redis pool tuning comes from the
//! `REDIS_*` variables read by [`RedisConfig::from_env`].

use flagstore_cache::CacheConfig;
use flagstore_client::{ClientConfig, UpdateMode, mask_key};
use flagstore_config::{ConfigManager, ConfigValidator, Result, Validate, de};
use flagstore_redis::RedisConfig;
use flagstore_store::DEFAULT_PREFIX;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::logging::{LogConfig, LogFormat, LogLevel};

/// Prefix of the environment variables read into [`Settings`].
pub const ENV_PREFIX: &str = "FLAGSTORE";

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_APPLICATION: &str = "Flagstore Demo App";

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_start_wait_ms() -> u64 {
    2_000
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

fn default_application() -> String {
    DEFAULT_APPLICATION.to_string()
}

#[derive(Clone, Deserialize)]
pub struct Settings {
    /// Required unless `offline`.
    #[serde(default)]
    pub sdk_key: Option<String>,

    /// Overrides `REDIS_URL` when set.
    #[serde(default)]
    pub redis_url: Option<String>,

    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default, deserialize_with = "de::boolean")]
    pub offline: bool,

    #[serde(default, deserialize_with = "de::parsed")]
    pub update_mode: UpdateMode,

    #[serde(default = "default_poll_interval_secs", deserialize_with = "de::number")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_start_wait_ms", deserialize_with = "de::number")]
    pub start_wait_ms: u64,

    #[serde(default, deserialize_with = "de::opt_number")]
    pub cache_ttl_secs: Option<u64>,

    #[serde(default, deserialize_with = "de::opt_number")]
    pub cache_max_entries: Option<usize>,

    #[serde(default = "default_port", deserialize_with = "de::number")]
    pub port: u16,

    #[serde(default = "default_log_level", deserialize_with = "de::parsed")]
    pub log_level: LogLevel,

    #[serde(default = "default_log_format", deserialize_with = "de::parsed")]
    pub log_format: LogFormat,

    /// Name reported by the health endpoint.
    #[serde(default = "default_application")]
    pub application: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sdk_key: None,
            redis_url: None,
            prefix: default_prefix(),
            offline: false,
            update_mode: UpdateMode::default(),
            poll_interval_secs: default_poll_interval_secs(),
            start_wait_ms: default_start_wait_ms(),
            cache_ttl_secs: None,
            cache_max_entries: None,
            port: default_port(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            application: default_application(),
        }
    }
}

impl Settings {
    /// Load settings from `file` (if any), `.env` and the environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let config = ConfigManager::with_prefix(ENV_PREFIX);
        if let Some(file) = file {
            config.load_file(file)?;
        }
        config.load_dotenv(None)?;
        Self::from_manager(&config)
    }

    /// Deserialize and validate whatever `config` holds.
    pub fn from_manager(config: &ConfigManager) -> Result<Self> {
        config.load_validated()
    }

    pub fn start_wait(&self) -> Duration {
        Duration::from_millis(self.start_wait_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn has_sdk_key(&self) -> bool {
        self.sdk_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    pub fn redis_config(&self) -> RedisConfig {
        let mut builder = RedisConfig::from_env();
        if let Some(url) = &self.redis_url {
            builder = builder.url(url.clone());
        }
        builder.build()
    }

    pub fn cache_config(&self) -> CacheConfig {
        let mut cache = CacheConfig::new();
        if let Some(ttl) = self.cache_ttl_secs {
            cache = cache.with_ttl(Duration::from_secs(ttl));
        }
        if let Some(max) = self.cache_max_entries {
            cache = cache.with_max_entries(max);
        }
        cache
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut builder = ClientConfig::builder()
            .offline(self.offline)
            .update_mode(self.update_mode)
            .poll_interval(self.poll_interval())
            .start_wait(self.start_wait())
            .prefix(self.prefix.clone())
            .redis(self.redis_config())
            .cache(self.cache_config());
        if let Some(key) = &self.sdk_key {
            builder = builder.sdk_key(key.clone());
        }
        builder.build()
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig::new().level(self.log_level).format(self.log_format)
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        ConfigValidator::is_port(self.port, "port")?;
        ConfigValidator::not_empty(&self.prefix, "prefix")?;
        ConfigValidator::not_empty(&self.application, "application")?;
        ConfigValidator::positive(self.poll_interval_secs, "poll_interval_secs")?;
        if let Some(url) = &self.redis_url {
            ConfigValidator::has_scheme(url, &["redis", "rediss"], "redis_url")?;
        }
        if let Some(ttl) = self.cache_ttl_secs {
            ConfigValidator::positive(ttl, "cache_ttl_secs")?;
        }
        if let Some(max) = self.cache_max_entries {
            ConfigValidator::positive(max as u64, "cache_max_entries")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("sdk_key", &self.sdk_key.as_deref().map(mask_key))
            .field("redis_url", &self.redis_url.as_ref().map(|_| "<set>"))
            .field("prefix", &self.prefix)
            .field("offline", &self.offline)
            .field("update_mode", &self.update_mode)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("start_wait_ms", &self.start_wait_ms)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("cache_max_entries", &self.cache_max_entries)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("application", &self.application)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_manager(&ConfigManager::with_prefix(ENV_PREFIX)).unwrap();
        assert_eq!(settings.port, DEFAULT_PORT);
        assert_eq!(settings.prefix, "flagstore");
        assert_eq!(settings.update_mode, UpdateMode::Streaming);
        assert_eq!(settings.start_wait(), Duration::from_secs(2));
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.application, DEFAULT_APPLICATION);
        assert!(!settings.has_sdk_key());
    }

    #[test]
    fn test_environment_overrides_file() {
        let config = ConfigManager::with_prefix(ENV_PREFIX);
        config.merge_value(json!({
            "sdk_key": "sdk-from-file-0000",
            "port": 3000,
            "update_mode": "streaming",
            "cache_ttl_secs": 60,
        }));
        config.load_env_from(env(&[
            ("FLAGSTORE_PORT", "9000"),
            ("FLAGSTORE_UPDATE_MODE", "poll"),
            ("FLAGSTORE_OFFLINE", "false"),
            ("FLAGSTORE_LOG_LEVEL", "debug"),
        ]));

        let settings = Settings::from_manager(&config).unwrap();
        assert_eq!(settings.port, 9000);
        assert_eq!(settings.update_mode, UpdateMode::Polling);
        assert_eq!(settings.cache_ttl_secs, Some(60));
        assert_eq!(settings.log_level, LogLevel::Debug);
        assert_eq!(settings.sdk_key.as_deref(), Some("sdk-from-file-0000"));
    }

    #[test]
    fn test_validation() {
        let config = ConfigManager::with_prefix(ENV_PREFIX);
        config.load_env_from(env(&[("FLAGSTORE_REDIS_URL", "http://localhost")]));
        assert!(Settings::from_manager(&config).is_err());

        let config = ConfigManager::with_prefix(ENV_PREFIX);
        config.load_env_from(env(&[("FLAGSTORE_POLL_INTERVAL_SECS", "0")]));
        assert!(Settings::from_manager(&config).is_err());

        let config = ConfigManager::with_prefix(ENV_PREFIX);
        config.load_env_from(env(&[("FLAGSTORE_UPDATE_MODE", "push")]));
        assert!(Settings::from_manager(&config).is_err());
    }

    #[test]
    fn test_client_config() {
        let settings = Settings {
            sdk_key: Some("sdk-0123456789-abcd".to_string()),
            redis_url: Some("redis://cache:6380".to_string()),
            update_mode: UpdateMode::Polling,
            poll_interval_secs: 10,
            cache_max_entries: Some(500),
            ..Settings::default()
        };
        let config = settings.client_config();
        assert_eq!(config.update_mode, UpdateMode::Polling);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.redis.url, "redis://cache:6380");
        assert_eq!(config.cache.max_entries, Some(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_masks_secrets() {
        let settings = Settings {
            sdk_key: Some("sdk-0123456789-abcd".to_string()),
            redis_url: Some("redis://:hunter2@cache:6379".to_string()),
            ..Settings::default()
        };
        let debug = format!("{:?}", settings);
        assert!(debug.contains("sdk-012345...abcd"));
        assert!(!debug.contains("hunter2"));
    }
}
