//! Evaluation contexts.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::ContextError;

/// Kind assigned to contexts that do not name one.
pub const DEFAULT_KIND: &str = "user";

fn default_kind() -> String {
    DEFAULT_KIND.to_string()
}

/// The identity and attributes a flag is evaluated against.
///
/// In JSON, `key`, `name` and `kind` are top-level fields and every other
/// field becomes an attribute:
///
/// ```
/// use flagstore_core::Context;
///
/// let ctx: Context = serde_json::from_str(
///     r#"{"key": "user-1", "name": "Ada", "email": "ada@example.com"}"#,
/// ).unwrap();
///
/// assert_eq!(ctx.key(), "user-1");
/// assert_eq!(ctx.kind(), "user");
/// assert_eq!(ctx.get("email").unwrap(), "ada@example.com");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    #[serde(default)]
    key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,

    #[serde(default = "default_kind")]
    kind: String,

    #[serde(flatten)]
    attributes: BTreeMap<String, Value>,
}

impl Context {
    /// Create a context of the default kind.
    ///
    /// No validation happens here; evaluation rejects invalid contexts.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: None,
            kind: default_kind(),
            attributes: BTreeMap::new(),
        }
    }

    /// Start building a validated context.
    pub fn builder(key: impl Into<String>) -> ContextBuilder {
        ContextBuilder {
            context: Self::new(key),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Set a custom attribute. `key`, `name` and `kind` are not attributes
    /// and are ignored here.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        if !is_builtin(&name) {
            self.attributes.insert(name, value.into());
        }
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// Look up an attribute by name, including the built-in ones.
    pub fn get(&self, attribute: &str) -> Option<Value> {
        match attribute {
            "key" => Some(Value::String(self.key.clone())),
            "kind" => Some(Value::String(self.kind.clone())),
            "name" => self.name.clone().map(Value::String),
            other => self.attributes.get(other).cloned(),
        }
    }

    /// Check the context can be evaluated.
    pub fn validate(&self) -> Result<(), ContextError> {
        if self.key.is_empty() {
            return Err(ContextError::EmptyKey);
        }
        if !valid_kind(&self.kind) {
            return Err(ContextError::InvalidKind(self.kind.clone()));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

fn is_builtin(name: &str) -> bool {
    matches!(name, "key" | "kind" | "name")
}

fn valid_kind(kind: &str) -> bool {
    !kind.is_empty()
        && kind != "kind"
        && kind != "multi"
        && kind
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Builder for [`Context`] that validates on [`build`](ContextBuilder::build).
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    context: Context,
}

impl ContextBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.context = self.context.with_name(name);
        self
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.context = self.context.with_kind(kind);
        self
    }

    pub fn set(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context = self.context.with_attribute(attribute, value);
        self
    }

    pub fn build(self) -> Result<Context, ContextError> {
        self.context.validate()?;
        Ok(self.context)
    }
}
