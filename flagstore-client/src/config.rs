//! Client configuration.

use flagstore_cache::CacheConfig;
use flagstore_redis::RedisConfig;
use flagstore_store::DEFAULT_PREFIX;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::InitError;

/// Polling never runs more often than this.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How the update listener learns about flag changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Subscribe to change events, polling only while disconnected.
    #[default]
    Streaming,
    /// Reload every flag on a fixed interval.
    Polling,
}

impl UpdateMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Streaming => "streaming",
            Self::Polling => "polling",
        }
    }

    /// The other mode.
    pub fn toggled(self) -> Self {
        match self {
            Self::Streaming => Self::Polling,
            Self::Polling => Self::Streaming,
        }
    }
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "streaming" | "stream" => Ok(Self::Streaming),
            "polling" | "poll" => Ok(Self::Polling),
            other => Err(format!("unknown update mode: {}", other)),
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// SDK key identifying the environment. Required unless offline.
    pub sdk_key: Option<String>,
    /// Serve fallbacks only; never touch the store.
    pub offline: bool,
    pub update_mode: UpdateMode,
    /// Reload interval in polling mode and while streaming is down.
    pub poll_interval: Duration,
    /// How long initialization waits for the first full load.
    pub start_wait: Duration,
    /// Store key prefix.
    pub prefix: String,
    pub redis: RedisConfig,
    pub cache: CacheConfig,
    /// First reconnect delay after the change stream fails.
    pub reconnect_initial: Duration,
    /// Upper bound on the reconnect delay.
    pub reconnect_max: Duration,
    /// Grace period for the listener to stop on close before it is aborted.
    pub close_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            sdk_key: None,
            offline: false,
            update_mode: UpdateMode::Streaming,
            poll_interval: Duration::from_secs(5),
            start_wait: Duration::from_secs(2),
            prefix: DEFAULT_PREFIX.to_string(),
            redis: RedisConfig::default(),
            cache: CacheConfig::default(),
            reconnect_initial: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(30),
            close_timeout: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Check the settings the client cannot run without.
    pub fn validate(&self) -> Result<(), InitError> {
        if !self.offline && self.sdk_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
            return Err(InitError::MissingSdkKey);
        }
        self.cache
            .validate()
            .map_err(|e| InitError::Config(e.to_string()))?;
        if !self.offline {
            self.redis
                .validate()
                .map_err(|e| InitError::Config(e.to_string()))?;
        }
        if self.prefix.is_empty() {
            return Err(InitError::Config("prefix must not be empty".to_string()));
        }
        Ok(())
    }

    /// Effective poll interval, never below [`MIN_POLL_INTERVAL`].
    pub fn effective_poll_interval(&self) -> Duration {
        self.poll_interval.max(MIN_POLL_INTERVAL)
    }

    /// SDK key safe to log: the first 10 and last 4 characters.
    pub fn masked_sdk_key(&self) -> String {
        self.sdk_key.as_deref().map(mask_key).unwrap_or_default()
    }
}

/// Mask a secret as `{first 10}...{last 4}`.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let head: String = chars.iter().take(10).collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn sdk_key(mut self, key: impl Into<String>) -> Self {
        self.config.sdk_key = Some(key.into());
        self
    }

    pub fn offline(mut self, offline: bool) -> Self {
        self.config.offline = offline;
        self
    }

    pub fn update_mode(mut self, mode: UpdateMode) -> Self {
        self.config.update_mode = mode;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn start_wait(mut self, wait: Duration) -> Self {
        self.config.start_wait = wait;
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.prefix = prefix.into();
        self
    }

    pub fn redis(mut self, redis: RedisConfig) -> Self {
        self.config.redis = redis;
        self
    }

    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    pub fn reconnect(mut self, initial: Duration, max: Duration) -> Self {
        self.config.reconnect_initial = initial;
        self.config.reconnect_max = max;
        self
    }

    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.config.close_timeout = timeout;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("sdk-1234567890-abcd-wxyz"), "sdk-123456...wxyz");
        assert_eq!(mask_key("abc"), "abc...abc");
        assert_eq!(mask_key(""), "...");
    }

    #[test]
    fn test_missing_sdk_key() {
        let config = ClientConfig::default();
        assert!(matches!(config.validate(), Err(InitError::MissingSdkKey)));

        let blank = ClientConfig::builder().sdk_key("  ").build();
        assert!(matches!(blank.validate(), Err(InitError::MissingSdkKey)));

        let offline = ClientConfig::builder().offline(true).build();
        assert!(offline.validate().is_ok());
    }

    #[test]
    fn test_poll_interval_floor() {
        let config = ClientConfig::builder()
            .poll_interval(Duration::from_millis(10))
            .build();
        assert_eq!(config.effective_poll_interval(), MIN_POLL_INTERVAL);
    }

    #[test]
    fn test_update_mode_parse() {
        assert_eq!("Polling".parse::<UpdateMode>(), Ok(UpdateMode::Polling));
        assert_eq!("stream".parse::<UpdateMode>(), Ok(UpdateMode::Streaming));
        assert!("push".parse::<UpdateMode>().is_err());
        assert_eq!(UpdateMode::Polling.to_string(), "polling");
        assert_eq!(UpdateMode::Streaming.toggled(), UpdateMode::Polling);
        assert_eq!(UpdateMode::Polling.toggled(), UpdateMode::Streaming);
    }
}
