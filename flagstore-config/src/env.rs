//! Environment variable loading.

use std::collections::HashMap;
use std::env;

use crate::{ConfigError, Result};

/// Reads configuration from environment variables.
///
/// With a prefix of `FLAGSTORE`, `FLAGSTORE_POLL_INTERVAL_SECS` becomes the
/// key `poll_interval_secs`. Variables without the prefix are ignored.
#[derive(Debug, Clone, Default)]
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    pub fn new(prefix: Option<String>) -> Self {
        Self {
            prefix: prefix.map(|p| p.trim_end_matches('_').to_uppercase()),
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Load every matching variable from the process environment.
    pub fn load(&self) -> HashMap<String, String> {
        self.load_from(env::vars())
    }

    /// Load every matching variable from `vars`.
    pub fn load_from(&self, vars: impl IntoIterator<Item = (String, String)>) -> HashMap<String, String> {
        vars.into_iter()
            .filter_map(|(key, value)| self.config_key(&key).map(|k| (k, value)))
            .collect()
    }

    /// Map an environment variable name to a configuration key.
    fn config_key(&self, var: &str) -> Option<String> {
        let key = match &self.prefix {
            Some(prefix) => var.strip_prefix(prefix.as_str())?.strip_prefix('_')?,
            None => var,
        };
        if key.is_empty() {
            return None;
        }
        Some(key.to_lowercase())
    }

    /// Load one variable by configuration key.
    pub fn load_var(&self, key: &str) -> Result<String> {
        env::var(self.var_name(key)).map_err(ConfigError::Env)
    }

    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }

    /// Environment variable name for a configuration key.
    pub fn var_name(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix, key.to_uppercase()),
            None => key.to_uppercase(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_prefix_filtering() {
        let loader = EnvLoader::new(Some("FLAGSTORE".to_string()));
        let loaded = loader.load_from(vars(&[
            ("FLAGSTORE_SDK_KEY", "sdk-abc"),
            ("FLAGSTORE_POLL_INTERVAL_SECS", "10"),
            ("FLAGSTOREX_OTHER", "no"),
            ("FLAGSTORE_", "empty"),
            ("HOME", "/root"),
        ]));

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded["sdk_key"], "sdk-abc");
        assert_eq!(loaded["poll_interval_secs"], "10");
    }

    #[test]
    fn test_prefix_normalized() {
        let loader = EnvLoader::new(Some("flagstore_".to_string()));
        assert_eq!(loader.prefix(), Some("FLAGSTORE"));
        assert_eq!(loader.var_name("redis_url"), "FLAGSTORE_REDIS_URL");
    }

    #[test]
    fn test_no_prefix() {
        let loader = EnvLoader::default();
        let loaded = loader.load_from(vars(&[("PORT", "8080")]));
        assert_eq!(loaded["port"], "8080");
    }

    #[test]
    fn test_missing_var() {
        let loader = EnvLoader::new(Some("FLAGSTORE_TEST".to_string()));
        assert!(loader.load_var("MISSING_VAR_67890").is_err());
        assert_eq!(loader.load_var_or("MISSING_VAR_67890", "fallback"), "fallback");
    }
}
