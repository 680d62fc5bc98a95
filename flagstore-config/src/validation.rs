//! Configuration validation.

use std::fmt::Display;

use crate::{ConfigError, Result};

/// Implemented by settings types that can check themselves after loading.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Reusable field checks.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", field)));
        }
        Ok(())
    }

    pub fn in_range<T: PartialOrd + Display>(value: T, min: T, max: T, field: &str) -> Result<()> {
        if value < min || value > max {
            return Err(ConfigError::Validation(format!(
                "{} must be between {} and {}, got {}",
                field, min, max, value
            )));
        }
        Ok(())
    }

    pub fn one_of<T: PartialEq + Display>(value: &T, allowed: &[T], field: &str) -> Result<()> {
        if !allowed.contains(value) {
            let allowed: Vec<String> = allowed.iter().map(ToString::to_string).collect();
            return Err(ConfigError::Validation(format!(
                "{} must be one of [{}], got {}",
                field,
                allowed.join(", "),
                value
            )));
        }
        Ok(())
    }

    /// Accept URLs with one of the given schemes, e.g. `["redis", "rediss"]`.
    pub fn has_scheme(value: &str, schemes: &[&str], field: &str) -> Result<()> {
        let ok = value
            .split_once("://")
            .is_some_and(|(scheme, rest)| schemes.contains(&scheme) && !rest.is_empty());
        if !ok {
            return Err(ConfigError::Validation(format!(
                "{} must be a {} URL",
                field,
                schemes.join("/")
            )));
        }
        Ok(())
    }

    pub fn is_port(value: u16, field: &str) -> Result<()> {
        if value == 0 {
            return Err(ConfigError::Validation(format!(
                "{} must be a valid port number",
                field
            )));
        }
        Ok(())
    }

    pub fn positive(value: u64, field: &str) -> Result<()> {
        if value == 0 {
            return Err(ConfigError::Validation(format!("{} must be greater than 0", field)));
        }
        Ok(())
    }
}
