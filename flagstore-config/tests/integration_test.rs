//! Integration tests for flagstore-config

use flagstore_config::*;
use serde::Deserialize;
use std::fs;
use tempfile::TempDir;

#[derive(Debug, Deserialize)]
struct AppSettings {
    name: String,
    #[serde(deserialize_with = "de::number")]
    workers: u32,
    #[serde(default, deserialize_with = "de::boolean")]
    debug: bool,
}

impl Validate for AppSettings {
    fn validate(&self) -> Result<()> {
        ConfigValidator::not_empty(&self.name, "name")?;
        ConfigValidator::in_range(self.workers, 1, 64, "workers")
    }
}

#[test]
fn test_toml_then_env_precedence() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.toml");
    fs::write(&path, "name = \"demo\"\nworkers = 4\n").unwrap();

    let config = ConfigManager::with_prefix("APPTEST");
    config.load_file(&path).unwrap();
    config.load_env_from([
        ("APPTEST_WORKERS".to_string(), "8".to_string()),
        ("APPTEST_DEBUG".to_string(), "true".to_string()),
    ]);

    let settings: AppSettings = config.load_validated().unwrap();
    assert_eq!(settings.name, "demo");
    assert_eq!(settings.workers, 8);
    assert!(settings.debug);
}

#[test]
fn test_json_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.json");
    fs::write(&path, r#"{"name": "json-app", "workers": 2}"#).unwrap();

    let config = ConfigManager::new();
    config.load_file(&path).unwrap();
    let settings: AppSettings = config.load_validated().unwrap();
    assert_eq!(settings.name, "json-app");
    assert!(!settings.debug);
}

#[test]
fn test_env_file_format() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.conf");
    fs::write(&path, "NAME=from-env-file\nWORKERS=3\n").unwrap();

    let config = ConfigManager::new();
    assert!(config.load_file(&path).is_err());
    config.load_file_as(&path, FileFormat::Env).unwrap();

    let settings: AppSettings = config.load_validated().unwrap();
    assert_eq!(settings.name, "from-env-file");
    assert_eq!(settings.workers, 3);
}

#[test]
fn test_validation_failure() {
    let config = ConfigManager::new();
    config.set("name", "demo").unwrap();
    config.set("workers", 0).unwrap();

    let err = config.load_validated::<AppSettings>().unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn test_missing_file() {
    let config = ConfigManager::new();
    let err = config.load_file("/nonexistent/flagstore.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Load(_)));
}

#[test]
fn test_malformed_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{not json").unwrap();

    let config = ConfigManager::new();
    assert!(matches!(config.load_file(&path), Err(ConfigError::Parse(_))));
}

#[test]
fn test_dotenv_loads_into_environment() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(".env");
    fs::write(&path, "CFGTEST_DOTENV_NAME=dotenv-app\n").unwrap();

    let config = ConfigManager::with_prefix("CFGTEST_DOTENV");
    let loaded = config.load_dotenv(Some(&path)).unwrap();
    assert!(loaded >= 1);
    assert_eq!(config.get_string("name").unwrap(), "dotenv-app");

    unsafe {
        std::env::remove_var("CFGTEST_DOTENV_NAME");
    }
}

#[test]
fn test_env_loader_reads_process_env() {
    unsafe {
        std::env::set_var("CFGTEST_PROC_REGION", "eu-west-1");
    }

    let loader = EnvLoader::new(Some("CFGTEST_PROC".to_string()));
    assert_eq!(loader.load_var("region").unwrap(), "eu-west-1");
    assert_eq!(loader.load().get("region").map(String::as_str), Some("eu-west-1"));

    unsafe {
        std::env::remove_var("CFGTEST_PROC_REGION");
    }
}

#[test]
fn test_error_display() {
    let err = ConfigError::KeyNotFound("sdk_key".to_string());
    assert_eq!(err.to_string(), "Configuration key not found: sdk_key");
}
