//! Lenient field deserializers.
//!
//! Environment variables and `.env` files only produce strings, while JSON
//! and TOML files produce native numbers and booleans. These helpers accept
//! both, for use with `#[serde(deserialize_with = "...")]`.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Deserialize)]
#[serde(untagged)]
enum Native<T> {
    Native(T),
    Text(String),
}

fn parse_text<T, E>(text: &str) -> Result<T, E>
where
    T: FromStr,
    T::Err: Display,
    E: de::Error,
{
    text.trim().parse().map_err(E::custom)
}

/// A number given natively or as a string.
pub fn number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    match Native::<T>::deserialize(deserializer)? {
        Native::Native(value) => Ok(value),
        Native::Text(text) => parse_text(&text),
    }
}

/// Optional number. An empty string means `None`.
pub fn opt_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    match Option::<Native<T>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Native::Native(value)) => Ok(Some(value)),
        Some(Native::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Native::Text(text)) => parse_text(&text).map(Some),
    }
}

/// A boolean given natively or as `true/false`, `yes/no`, `on/off`, `1/0`.
pub fn boolean<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Native::<bool>::deserialize(deserializer)? {
        Native::Native(value) => Ok(value),
        Native::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" | "" => Ok(false),
            other => Err(de::Error::custom(format!("invalid boolean: {}", other))),
        },
    }
}

/// Any `FromStr` type given as a string, such as an enum name.
pub fn parsed<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let text = String::deserialize(deserializer)?;
    parse_text(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(deserialize_with = "number")]
        port: u16,
        #[serde(default, deserialize_with = "opt_number")]
        ttl: Option<u64>,
        #[serde(deserialize_with = "boolean")]
        offline: bool,
        #[serde(default = "default_bind", deserialize_with = "parsed")]
        bind: std::net::IpAddr,
    }

    fn default_bind() -> std::net::IpAddr {
        std::net::IpAddr::from([127, 0, 0, 1])
    }

    #[test]
    fn test_native_values() {
        let sample: Sample =
            serde_json::from_value(json!({"port": 8080, "ttl": 30, "offline": true})).unwrap();
        assert_eq!(sample.port, 8080);
        assert_eq!(sample.ttl, Some(30));
        assert!(sample.offline);
        assert_eq!(sample.bind, default_bind());
    }

    #[test]
    fn test_string_values() {
        let sample: Sample =
            serde_json::from_value(json!({"port": " 9090", "ttl": "", "offline": "yes"})).unwrap();
        assert_eq!(sample.port, 9090);
        assert_eq!(sample.ttl, None);
        assert!(sample.offline);

        let sample: Sample = serde_json::from_value(json!({"port": "1", "offline": "0"})).unwrap();
        assert_eq!(sample.ttl, None);
        assert!(!sample.offline);
    }

    #[test]
    fn test_invalid_values() {
        assert!(serde_json::from_value::<Sample>(json!({"port": "http", "offline": true})).is_err());
        assert!(serde_json::from_value::<Sample>(json!({"port": 1, "offline": "maybe"})).is_err());
        assert!(serde_json::from_value::<Sample>(json!({"port": 70000, "offline": true})).is_err());
        assert!(
            serde_json::from_value::<Sample>(json!({"port": 1, "offline": true, "bind": "nope"}))
                .is_err()
        );
    }
}
