//! Bulk evaluation results for bootstrapping front-end clients.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;

use crate::eval::{EvaluationResult, Reason};
use crate::value::FlagValue;

/// Per-flag metadata carried under `$flagsState`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagState {
    pub value: FlagValue,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub variation: Option<usize>,

    pub version: u64,

    pub reason: Reason,
}

#[derive(serde::Serialize)]
struct FlagMeta<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    variation: Option<usize>,
    version: u64,
    reason: &'a Reason,
}

/// Evaluation of every flag for one context.
///
/// Serializes as
/// `{"<flag>": value, "$flagsState": {"<flag>": {...}}, "$valid": bool}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlagsState {
    flags: BTreeMap<String, FlagState>,
    valid: bool,
}

impl FlagsState {
    pub fn new() -> Self {
        Self {
            flags: BTreeMap::new(),
            valid: true,
        }
    }

    /// State returned when the flags could not be evaluated.
    pub fn invalid() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: impl Into<String>, version: u64, result: EvaluationResult) {
        self.flags.insert(
            key.into(),
            FlagState {
                value: result.value,
                variation: result.variation_index,
                version,
                reason: result.reason,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<&FlagState> {
        self.flags.get(key)
    }

    pub fn get_value(&self, key: &str) -> Option<&FlagValue> {
        self.flags.get(key).map(|s| &s.value)
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FlagState)> {
        self.flags.iter()
    }
}

impl Serialize for FlagsState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let meta: BTreeMap<&str, FlagMeta<'_>> = self
            .flags
            .iter()
            .map(|(key, state)| {
                (
                    key.as_str(),
                    FlagMeta {
                        variation: state.variation,
                        version: state.version,
                        reason: &state.reason,
                    },
                )
            })
            .collect();

        let mut map = serializer.serialize_map(Some(self.flags.len() + 2))?;
        for (key, state) in &self.flags {
            map.serialize_entry(key, &state.value)?;
        }
        map.serialize_entry("$flagsState", &meta)?;
        map.serialize_entry("$valid", &self.valid)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialize_shape() {
        let mut state = FlagsState::new();
        state.add(
            "banner",
            3,
            EvaluationResult {
                value: FlagValue::from("blue"),
                variation_index: Some(1),
                reason: Reason::Fallthrough,
            },
        );

        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            json!({
                "banner": "blue",
                "$flagsState": {
                    "banner": {"variation": 1, "version": 3, "reason": {"kind": "FALLTHROUGH"}}
                },
                "$valid": true
            })
        );
        assert_eq!(state.get_value("banner"), Some(&FlagValue::from("blue")));
    }

    #[test]
    fn test_invalid_state() {
        let state = FlagsState::invalid();
        assert!(!state.is_valid());
        assert!(state.is_empty());
        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            json!({"$flagsState": {}, "$valid": false})
        );
    }
}
