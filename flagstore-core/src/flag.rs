//! Flag definitions.
//!
//! A [`FlagDefinition`] is immutable once stored; a change is a new
//! definition with a higher `version`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::value::FlagValue;

/// Rollout weights are expressed in units of 1/100000.
pub const WEIGHT_SCALE: u32 = 100_000;

/// A versioned feature flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagDefinition {
    pub key: String,

    #[serde(default)]
    pub enabled: bool,

    pub variations: Vec<FlagValue>,

    /// Variation served when nothing else decides the outcome, and when the
    /// flag is off unless `off_variation` says otherwise.
    #[serde(default)]
    pub default_variation: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub off_variation: Option<usize>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<Target>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallthrough: Option<VariationOrRollout>,

    pub version: u64,

    /// Bucketing salt; the flag key is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,

    /// Tombstone marker. Deleted flags keep their version.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
}

impl FlagDefinition {
    /// Create an enabled flag with the given variations, serving the first
    /// one by default.
    pub fn new(key: impl Into<String>, variations: Vec<FlagValue>) -> Self {
        Self {
            key: key.into(),
            enabled: true,
            variations,
            default_variation: 0,
            off_variation: None,
            targets: Vec::new(),
            rules: Vec::new(),
            fallthrough: None,
            version: 1,
            salt: None,
            deleted: false,
        }
    }

    /// Create a boolean flag (`[false, true]`) that falls through to `value`.
    ///
    /// ```
    /// use flagstore_core::{Context, FlagDefinition};
    ///
    /// let flag = FlagDefinition::boolean("new-ui", true);
    /// let result = flag.evaluate(&Context::new("user-1")).unwrap();
    /// assert_eq!(result.value.as_bool(), Some(true));
    /// ```
    pub fn boolean(key: impl Into<String>, value: bool) -> Self {
        Self::new(key, vec![FlagValue::Bool(false), FlagValue::Bool(true)])
            .with_fallthrough(VariationOrRollout::Variation(usize::from(value)))
    }

    /// Create a tombstone for `key` at `version`.
    pub fn tombstone(key: impl Into<String>, version: u64) -> Self {
        Self {
            enabled: false,
            deleted: true,
            version,
            ..Self::new(key, Vec::new())
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn with_default_variation(mut self, index: usize) -> Self {
        self.default_variation = index;
        self
    }

    pub fn with_off_variation(mut self, index: usize) -> Self {
        self.off_variation = Some(index);
        self
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.targets.push(target);
        self
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_fallthrough(mut self, fallthrough: VariationOrRollout) -> Self {
        self.fallthrough = Some(fallthrough);
        self
    }

    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    /// Index served while the flag is off.
    pub fn off_index(&self) -> usize {
        self.off_variation.unwrap_or(self.default_variation)
    }

    pub fn salt(&self) -> &str {
        self.salt.as_deref().unwrap_or(&self.key)
    }

    pub fn variation(&self, index: usize) -> Option<&FlagValue> {
        self.variations.get(index)
    }
}

/// Individual targeting: context keys that always get one variation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub values: Vec<String>,
    pub variation: usize,
}

impl Target {
    pub fn new(variation: usize, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            values: keys.into_iter().map(Into::into).collect(),
            variation,
        }
    }
}

/// Targeting rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Rule clauses (all must match)
    #[serde(default)]
    pub clauses: Vec<Clause>,

    #[serde(flatten)]
    pub result: VariationOrRollout,
}

impl Rule {
    pub fn new(result: VariationOrRollout) -> Self {
        Self {
            id: None,
            clauses: Vec::new(),
            result,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_clause(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }
}

/// Targeting condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    /// Attribute to check
    pub attribute: String,

    pub op: Operator,

    /// Values to compare against
    pub values: Vec<serde_json::Value>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub negate: bool,

    #[serde(skip)]
    pub(crate) patterns: CompiledPatterns,
}

impl Clause {
    pub fn new(
        attribute: impl Into<String>,
        op: Operator,
        values: Vec<serde_json::Value>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            op,
            values,
            negate: false,
            patterns: CompiledPatterns::default(),
        }
    }

    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }
}

/// Regexes for a `matches` clause, compiled on first use and keyed by
/// pattern. Invalid patterns map to `None`.
#[derive(Debug, Clone, Default)]
pub(crate) struct CompiledPatterns(OnceLock<HashMap<String, Option<Regex>>>);

impl CompiledPatterns {
    pub(crate) fn get_or_compile(&self, values: &[serde_json::Value]) -> &HashMap<String, Option<Regex>> {
        self.0.get_or_init(|| {
            values
                .iter()
                .filter_map(serde_json::Value::as_str)
                .map(|pattern| (pattern.to_string(), Regex::new(pattern).ok()))
                .collect()
        })
    }

    pub(crate) fn compiled(&self) -> Option<&HashMap<String, Option<Regex>>> {
        self.0.get()
    }
}

// Derived state; two clauses are equal by their fields alone.
impl PartialEq for CompiledPatterns {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    In,
    EndsWith,
    StartsWith,
    Contains,
    Matches,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Before,
    After,
    /// Operators this build does not know. They never match.
    #[serde(other)]
    Unknown,
}

/// Either a fixed variation or a percentage rollout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VariationOrRollout {
    Variation(usize),
    Rollout(Rollout),
}

/// Weighted split of contexts across variations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rollout {
    pub variations: Vec<WeightedVariation>,

    /// Attribute to bucket by (default: the context key)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_by: Option<String>,
}

impl Rollout {
    pub fn new(variations: Vec<WeightedVariation>) -> Self {
        Self {
            variations,
            bucket_by: None,
        }
    }

    /// Split between two variations, serving `on` to `percent` of contexts.
    pub fn percentage(percent: u8, on: usize, off: usize) -> Self {
        let on_weight = u32::from(percent.min(100)) * (WEIGHT_SCALE / 100);
        Self::new(vec![
            WeightedVariation::new(on, on_weight),
            WeightedVariation::new(off, WEIGHT_SCALE - on_weight),
        ])
    }

    pub fn with_bucket_by(mut self, attribute: impl Into<String>) -> Self {
        self.bucket_by = Some(attribute.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedVariation {
    pub variation: usize,
    pub weight: u32,
}

impl WeightedVariation {
    pub fn new(variation: usize, weight: u32) -> Self {
        Self { variation, weight }
    }
}
