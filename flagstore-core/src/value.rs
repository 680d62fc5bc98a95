//! Flag values.
//!
//! A flag's variations and every evaluation result carry a [`FlagValue`].

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// A typed flag variation.
///
/// Serialized untagged, so a variation list in JSON is just
/// `[false, true]` or `["red", "blue"]`. Numbers keep their JSON form, so
/// an integer variation is served as `10`, not `10.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Number(Number),
    Str(String),
    Json(Value),
}

impl FlagValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Integer view of a number variation. `None` for fractional numbers.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// Borrow a JSON object, array or null variation.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Convert into a plain JSON value.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::Str(s) => Value::String(s.clone()),
            Self::Json(v) => v.clone(),
        }
    }

    /// Name of the value's type, used in wrong-type diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Json(_) => "json",
        }
    }

    /// Whether two values have the same variant.
    pub fn same_type(&self, other: &FlagValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl Default for FlagValue {
    fn default() -> Self {
        Self::Json(Value::Null)
    }
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for FlagValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Non-finite floats have no JSON form and become `null`.
impl From<f64> for FlagValue {
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(Self::Json(Value::Null), Self::Number)
    }
}

impl From<i64> for FlagValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<Value> for FlagValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Bool(b) => Self::Bool(b),
            Value::String(s) => Self::Str(s),
            Value::Number(n) => Self::Number(n),
            other => Self::Json(other),
        }
    }
}
