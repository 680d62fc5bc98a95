//! Layered configuration store.

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::env::EnvLoader;
use crate::loader::{ConfigLoader, FileFormat};
use crate::validation::Validate;
use crate::{ConfigError, Result};

/// Flat key/value configuration built from layered sources.
///
/// Later loads override earlier ones, so load in order of increasing
/// precedence: defaults, then files, then the environment.
///
/// ```
/// use flagstore_config::ConfigManager;
///
/// let config = ConfigManager::new();
/// config.set("port", 8080).unwrap();
/// assert_eq!(config.get::<u16>("port").unwrap(), 8080);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigManager {
    values: Arc<RwLock<Map<String, Value>>>,
    env_prefix: Option<String>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager that reads `{prefix}_*` environment variables.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            values: Arc::default(),
            env_prefix: Some(prefix.into()),
        }
    }

    fn env_loader(&self) -> EnvLoader {
        EnvLoader::new(self.env_prefix.clone())
    }

    /// Load matching environment variables.
    pub fn load_env(&self) -> usize {
        self.load_env_from(std::env::vars())
    }

    /// Load matching variables from `vars` instead of the process
    /// environment.
    pub fn load_env_from(&self, vars: impl IntoIterator<Item = (String, String)>) -> usize {
        let loaded = self.env_loader().load_from(vars);
        let count = loaded.len();
        let mut values = self.values.write();
        for (key, value) in loaded {
            values.insert(key, Value::String(value));
        }
        debug!(count, prefix = ?self.env_prefix, "Loaded configuration from environment");
        count
    }

    /// Read a `.env` file into the process environment, then load the
    /// environment. Without a path a missing `.env` is not an error.
    pub fn load_dotenv(&self, path: Option<&Path>) -> Result<usize> {
        match path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| ConfigError::Load(e.to_string()))?;
            }
            None => {
                if let Err(e) = dotenvy::dotenv()
                    && !e.not_found()
                {
                    return Err(ConfigError::Load(e.to_string()));
                }
            }
        }
        Ok(self.load_env())
    }

    /// Load a configuration file, detecting its format from the extension.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let loader = ConfigLoader::auto(path)?;
        self.merge_value(loader.load_file(path)?);
        Ok(())
    }

    pub fn load_file_as(&self, path: impl AsRef<Path>, format: FileFormat) -> Result<()> {
        self.merge_value(ConfigLoader::new(format).load_file(path)?);
        Ok(())
    }

    /// Merge the top-level keys of a JSON object. Other values are ignored.
    pub fn merge_value(&self, value: Value) {
        if let Value::Object(map) = value {
            self.values.write().extend(map);
        }
    }

    /// Merge another manager's values over this one's.
    pub fn merge(&self, other: &ConfigManager) {
        let other = other.values.read().clone();
        self.values.write().extend(other);
    }

    pub fn set<T: Serialize>(&self, key: &str, value: T) -> Result<()> {
        let value =
            serde_json::to_value(value).map_err(|e| ConfigError::Serialization(e.to_string()))?;
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .values
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;
        serde_json::from_value(value)
            .map_err(|e| ConfigError::Deserialization(format!("{}: {}", key, e)))
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    pub fn get_string(&self, key: &str) -> Result<String> {
        self.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.values.read().keys().cloned().collect()
    }

    /// Deserialize every value into `T`.
    pub fn extract<T: DeserializeOwned>(&self) -> Result<T> {
        let values = Value::Object(self.values.read().clone());
        serde_json::from_value(values).map_err(|e| ConfigError::Deserialization(e.to_string()))
    }

    /// Deserialize into `T` and validate it.
    pub fn load_validated<T: DeserializeOwned + Validate>(&self) -> Result<T> {
        let config: T = self.extract()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_set_and_get() {
        let manager = ConfigManager::new();
        manager.set("prefix", "flags").unwrap();
        manager.set("port", 8080u16).unwrap();

        assert_eq!(manager.get_string("prefix").unwrap(), "flags");
        assert_eq!(manager.get::<u16>("port").unwrap(), 8080);
        assert!(matches!(manager.get::<u16>("prefix"), Err(ConfigError::Deserialization(_))));
        assert!(matches!(manager.get::<u16>("missing"), Err(ConfigError::KeyNotFound(_))));
        assert_eq!(manager.get_or("missing", 3u8), 3);
    }

    #[test]
    fn test_env_overrides_file_values() {
        let manager = ConfigManager::with_prefix("FLAGSTORE");
        manager.merge_value(json!({"port": 8080, "prefix": "file"}));
        manager.load_env_from([("FLAGSTORE_PORT".to_string(), "9090".to_string())]);

        assert_eq!(manager.get_string("port").unwrap(), "9090");
        assert_eq!(manager.get_string("prefix").unwrap(), "file");
        assert!(manager.has("port"));
        assert_eq!(manager.keys().len(), 2);
    }

    #[test]
    fn test_merge() {
        let base = ConfigManager::new();
        base.set("a", 1).unwrap();
        base.set("b", 1).unwrap();
        let overlay = ConfigManager::new();
        overlay.set("b", 2).unwrap();

        base.merge(&overlay);
        assert_eq!(base.get::<i64>("a").unwrap(), 1);
        assert_eq!(base.get::<i64>("b").unwrap(), 2);
    }

    #[derive(Debug, Deserialize)]
    struct Server {
        port: u16,
    }

    impl Validate for Server {
        fn validate(&self) -> Result<()> {
            crate::ConfigValidator::is_port(self.port, "port")
        }
    }

    #[test]
    fn test_load_validated() {
        let manager = ConfigManager::new();
        manager.set("port", 0).unwrap();
        assert!(matches!(
            manager.load_validated::<Server>(),
            Err(ConfigError::Validation(_))
        ));

        manager.set("port", 3000).unwrap();
        assert_eq!(manager.load_validated::<Server>().unwrap().port, 3000);
    }
}
