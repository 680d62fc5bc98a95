//! Flag evaluation.
//!
//! Evaluation is a pure function of the flag and the context: no I/O, no
//! shared state, safe to call from any thread.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bucket::{bucket_context, select_variation};
use crate::context::Context;
use crate::error::{EvalError, Result};
use crate::flag::{Clause, FlagDefinition, Operator, VariationOrRollout};
use crate::value::FlagValue;

/// Why an evaluation produced its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reason {
    Off,
    Fallthrough,
    TargetMatch,
    RuleMatch {
        #[serde(rename = "ruleIndex")]
        rule_index: usize,
        #[serde(rename = "ruleId", default, skip_serializing_if = "Option::is_none")]
        rule_id: Option<String>,
    },
    /// No target, rule or fallthrough decided; the default variation was served.
    Default,
    Error {
        #[serde(rename = "errorKind")]
        error_kind: ErrorKind,
    },
}

impl Reason {
    pub fn error(kind: ErrorKind) -> Self {
        Self::Error { error_kind: kind }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Error categories reported in [`Reason::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ClientNotReady,
    FlagNotFound,
    InvalidContext,
    MalformedFlag,
    WrongType,
}

impl From<&EvalError> for ErrorKind {
    fn from(err: &EvalError) -> Self {
        match err {
            EvalError::InvalidContext(_) => ErrorKind::InvalidContext,
            EvalError::MalformedFlag { .. } => ErrorKind::MalformedFlag,
        }
    }
}

/// Outcome of evaluating a flag for a context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub value: FlagValue,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation_index: Option<usize>,

    pub reason: Reason,
}

impl EvaluationResult {
    /// Serve a caller-supplied fallback because of an error.
    pub fn fallback(value: FlagValue, kind: ErrorKind) -> Self {
        Self {
            value,
            variation_index: None,
            reason: Reason::error(kind),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.reason.is_error()
    }
}

impl FlagDefinition {
    /// Evaluate the flag for a context.
    ///
    /// Fails with [`EvalError::InvalidContext`] for an invalid context and
    /// [`EvalError::MalformedFlag`] when the flag points at a variation that
    /// does not exist.
    pub fn evaluate(&self, context: &Context) -> Result<EvaluationResult> {
        context.validate()?;

        if !self.enabled {
            return Ok(self.off_result());
        }

        for target in &self.targets {
            if target.values.iter().any(|k| k == context.key()) {
                return self.serve(target.variation, Reason::TargetMatch);
            }
        }

        for (index, rule) in self.rules.iter().enumerate() {
            if rule.clauses.iter().all(|c| clause_matches(c, context)) {
                let reason = Reason::RuleMatch {
                    rule_index: index,
                    rule_id: rule.id.clone(),
                };
                return self.resolve(&rule.result, context, reason);
            }
        }

        match &self.fallthrough {
            Some(fallthrough) => self.resolve(fallthrough, context, Reason::Fallthrough),
            None => self.serve(self.default_variation, Reason::Default),
        }
    }

    /// Evaluate the flag, substituting `fallback` on any error and for an
    /// off flag without a valid off variation.
    pub fn evaluate_or(&self, context: &Context, fallback: FlagValue) -> EvaluationResult {
        match self.evaluate(context) {
            Ok(result) if result.variation_index.is_none() => EvaluationResult {
                value: fallback,
                ..result
            },
            Ok(result) => result,
            Err(err) => EvaluationResult::fallback(fallback, ErrorKind::from(&err)),
        }
    }

    // An off flag pointing outside its variations serves null with no index.
    fn off_result(&self) -> EvaluationResult {
        let index = self.off_index();
        match self.variation(index) {
            Some(value) => EvaluationResult {
                value: value.clone(),
                variation_index: Some(index),
                reason: Reason::Off,
            },
            None => EvaluationResult {
                value: FlagValue::default(),
                variation_index: None,
                reason: Reason::Off,
            },
        }
    }

    fn resolve(
        &self,
        result: &VariationOrRollout,
        context: &Context,
        reason: Reason,
    ) -> Result<EvaluationResult> {
        let index = match result {
            VariationOrRollout::Variation(index) => *index,
            VariationOrRollout::Rollout(rollout) => {
                let bucket =
                    bucket_context(&self.key, self.salt(), context, rollout.bucket_by.as_deref());
                select_variation(rollout, bucket)
                    .ok_or_else(|| EvalError::malformed(&self.key, "rollout has no variations"))?
            }
        };
        self.serve(index, reason)
    }

    fn serve(&self, index: usize, reason: Reason) -> Result<EvaluationResult> {
        let value = self.variation(index).cloned().ok_or_else(|| {
            EvalError::malformed(
                &self.key,
                format!("variation {} out of {}", index, self.variations.len()),
            )
        })?;

        Ok(EvaluationResult {
            value,
            variation_index: Some(index),
            reason,
        })
    }
}

/// Check a single clause. A missing attribute never matches, negated or not.
pub fn clause_matches(clause: &Clause, context: &Context) -> bool {
    let Some(actual) = context.get(&clause.attribute) else {
        return false;
    };

    let matched = match actual {
        Value::Array(items) => items.iter().any(|item| any_value_matches(clause, item)),
        single => any_value_matches(clause, &single),
    };

    matched != clause.negate
}

fn any_value_matches(clause: &Clause, actual: &Value) -> bool {
    clause
        .values
        .iter()
        .any(|expected| operator_matches(clause, actual, expected))
}

fn operator_matches(clause: &Clause, actual: &Value, expected: &Value) -> bool {
    match clause.op {
        Operator::In => values_equal(actual, expected),
        Operator::EndsWith => strings(actual, expected).is_some_and(|(a, e)| a.ends_with(e)),
        Operator::StartsWith => strings(actual, expected).is_some_and(|(a, e)| a.starts_with(e)),
        Operator::Contains => strings(actual, expected).is_some_and(|(a, e)| a.contains(e)),
        Operator::Matches => strings(actual, expected).is_some_and(|(a, pattern)| {
            match clause.patterns.get_or_compile(&clause.values).get(pattern) {
                Some(compiled) => compiled.as_ref().is_some_and(|re| re.is_match(a)),
                // Values edited after the first evaluation
                None => Regex::new(pattern).is_ok_and(|re| re.is_match(a)),
            }
        }),
        Operator::LessThan => numbers(actual, expected).is_some_and(|(a, e)| a < e),
        Operator::LessThanOrEqual => numbers(actual, expected).is_some_and(|(a, e)| a <= e),
        Operator::GreaterThan => numbers(actual, expected).is_some_and(|(a, e)| a > e),
        Operator::GreaterThanOrEqual => numbers(actual, expected).is_some_and(|(a, e)| a >= e),
        Operator::Before => timestamps(actual, expected).is_some_and(|(a, e)| a < e),
        Operator::After => timestamps(actual, expected).is_some_and(|(a, e)| a > e),
        Operator::Unknown => false,
    }
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => actual == expected,
    }
}

fn strings<'a>(actual: &'a Value, expected: &'a Value) -> Option<(&'a str, &'a str)> {
    Some((actual.as_str()?, expected.as_str()?))
}

fn numbers(actual: &Value, expected: &Value) -> Option<(f64, f64)> {
    Some((actual.as_f64()?, expected.as_f64()?))
}

fn timestamps(actual: &Value, expected: &Value) -> Option<(f64, f64)> {
    Some((to_millis(actual)?, to_millis(expected)?))
}

// Epoch milliseconds or an RFC 3339 string.
fn to_millis(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.timestamp_millis() as f64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContextError;
    use crate::flag::{Rollout, Rule, Target};
    use serde_json::json;

    fn on_off(key: &str) -> FlagDefinition {
        FlagDefinition::new(key, vec![FlagValue::from("off"), FlagValue::from("on")])
            .with_fallthrough(VariationOrRollout::Variation(1))
    }

    #[test]
    fn test_fallthrough() {
        let flag = on_off("new-feature");
        let result = flag.evaluate(&Context::new("user-1")).unwrap();

        assert_eq!(result.value.as_str(), Some("on"));
        assert_eq!(result.variation_index, Some(1));
        assert_eq!(result.reason, Reason::Fallthrough);
    }

    #[test]
    fn test_disabled_flag_ignores_rules() {
        let flag = on_off("f")
            .with_enabled(false)
            .with_rule(Rule::new(VariationOrRollout::Variation(1)));
        let ctx = Context::new("user-1");

        for _ in 0..3 {
            let result = flag.evaluate(&ctx).unwrap();
            assert_eq!(result.value.as_str(), Some("off"));
            assert_eq!(result.reason, Reason::Off);
        }
    }

    #[test]
    fn test_off_variation_override() {
        let flag = on_off("f").with_enabled(false).with_off_variation(1);
        let result = flag.evaluate(&Context::new("u")).unwrap();
        assert_eq!(result.variation_index, Some(1));
    }

    #[test]
    fn test_off_without_valid_variation() {
        let flag = on_off("f").with_enabled(false).with_off_variation(9);
        let ctx = Context::new("u");

        let result = flag.evaluate(&ctx).unwrap();
        assert_eq!(result.reason, Reason::Off);
        assert_eq!(result.variation_index, None);
        assert_eq!(result.value, FlagValue::default());

        let result = flag.evaluate_or(&ctx, FlagValue::from("fb"));
        assert_eq!(result.value.as_str(), Some("fb"));
        assert_eq!(result.reason, Reason::Off);
    }

    #[test]
    fn test_target_before_rules() {
        let flag = on_off("f")
            .with_target(Target::new(0, ["vip"]))
            .with_rule(Rule::new(VariationOrRollout::Variation(1)));

        let result = flag.evaluate(&Context::new("vip")).unwrap();
        assert_eq!(result.reason, Reason::TargetMatch);
        assert_eq!(result.variation_index, Some(0));
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let flag = FlagDefinition::new("f", vec![json!("a").into(), json!("b").into(), json!("c").into()])
            .with_rule(
                Rule::new(VariationOrRollout::Variation(1))
                    .with_id("corp")
                    .with_clause(Clause::new("email", Operator::EndsWith, vec![json!("@corp.com")])),
            )
            .with_rule(
                Rule::new(VariationOrRollout::Variation(2))
                    .with_clause(Clause::new("email", Operator::Contains, vec![json!("@")])),
            )
            .with_fallthrough(VariationOrRollout::Variation(0));

        let corp = Context::new("u").with_attribute("email", "a@corp.com");
        let result = flag.evaluate(&corp).unwrap();
        assert_eq!(result.value.as_str(), Some("b"));
        assert_eq!(
            result.reason,
            Reason::RuleMatch {
                rule_index: 0,
                rule_id: Some("corp".to_string())
            }
        );

        let other = Context::new("u").with_attribute("email", "a@home.org");
        assert_eq!(flag.evaluate(&other).unwrap().value.as_str(), Some("c"));

        let none = Context::new("u");
        assert_eq!(flag.evaluate(&none).unwrap().reason, Reason::Fallthrough);
    }

    #[test]
    fn test_clauses_are_anded() {
        let rule = Rule::new(VariationOrRollout::Variation(1))
            .with_clause(Clause::new("plan", Operator::In, vec![json!("pro")]))
            .with_clause(Clause::new("seats", Operator::GreaterThan, vec![json!(10)]));
        let flag = on_off("f").with_fallthrough(VariationOrRollout::Variation(0)).with_rule(rule);

        let both = Context::new("u").with_attribute("plan", "pro").with_attribute("seats", 20);
        let one = Context::new("u").with_attribute("plan", "pro").with_attribute("seats", 5);

        assert_eq!(flag.evaluate(&both).unwrap().variation_index, Some(1));
        assert_eq!(flag.evaluate(&one).unwrap().variation_index, Some(0));
    }

    #[test]
    fn test_invalid_context() {
        let flag = on_off("f");
        let err = flag.evaluate(&Context::new("")).unwrap_err();
        assert_eq!(err, EvalError::InvalidContext(ContextError::EmptyKey));

        let result = flag.evaluate_or(&Context::new(""), FlagValue::from(false));
        assert_eq!(result.value, FlagValue::Bool(false));
        assert_eq!(result.reason, Reason::error(ErrorKind::InvalidContext));
        assert_eq!(result.variation_index, None);
    }

    #[test]
    fn test_malformed_variation_index() {
        let flag = on_off("f").with_fallthrough(VariationOrRollout::Variation(7));
        let err = flag.evaluate(&Context::new("u")).unwrap_err();
        assert!(matches!(err, EvalError::MalformedFlag { .. }));

        let result = flag.evaluate_or(&Context::new("u"), FlagValue::from("fb"));
        assert_eq!(result.value.as_str(), Some("fb"));
        assert_eq!(result.reason, Reason::error(ErrorKind::MalformedFlag));
    }

    #[test]
    fn test_default_reason_without_fallthrough() {
        let flag = FlagDefinition::new("f", vec![json!(1).into(), json!(2).into()]).with_default_variation(1);
        let result = flag.evaluate(&Context::new("u")).unwrap();
        assert_eq!(result.reason, Reason::Default);
        assert_eq!(result.value.as_f64(), Some(2.0));
    }

    #[test]
    fn test_rollout_is_stable() {
        let flag = on_off("rollout-flag")
            .with_fallthrough(VariationOrRollout::Rollout(Rollout::percentage(50, 1, 0)));

        for i in 0..50 {
            let ctx = Context::new(format!("user-{}", i));
            let first = flag.evaluate(&ctx).unwrap().variation_index;
            let second = flag.clone().with_version(99).evaluate(&ctx).unwrap().variation_index;
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_rollout_distribution() {
        let flag = on_off("dist").with_fallthrough(VariationOrRollout::Rollout(Rollout::percentage(50, 1, 0)));

        let on = (0..1000)
            .filter(|i| {
                flag.evaluate(&Context::new(format!("user-{}", i)))
                    .unwrap()
                    .value
                    .as_str()
                    == Some("on")
            })
            .count();

        assert!((400..=600).contains(&on), "got {} of 1000", on);
    }

    #[test]
    fn test_empty_rollout_is_malformed() {
        let flag = on_off("f").with_fallthrough(VariationOrRollout::Rollout(Rollout::new(vec![])));
        assert!(matches!(
            flag.evaluate(&Context::new("u")),
            Err(EvalError::MalformedFlag { .. })
        ));
    }

    #[test]
    fn test_matches_compiles_patterns_once() {
        let clause = Clause::new(
            "email",
            Operator::Matches,
            vec![json!("@example\\.com$"), json!("(unclosed"), json!(3)],
        );
        assert!(clause.patterns.compiled().is_none());

        let ada = Context::new("u").with_attribute("email", "ada@example.com");
        let bob = Context::new("u").with_attribute("email", "bob@example.org");
        assert!(clause_matches(&clause, &ada));
        assert!(!clause_matches(&clause, &bob));

        let compiled = clause.patterns.compiled().unwrap();
        assert_eq!(compiled.len(), 2);
        assert!(compiled["@example\\.com$"].is_some());
        assert!(compiled["(unclosed"].is_none());

        // Clones and round trips compare equal regardless of the compiled state
        let parsed: Clause = serde_json::from_value(serde_json::to_value(&clause).unwrap()).unwrap();
        assert!(parsed.patterns.compiled().is_none());
        assert_eq!(parsed, clause);
    }

    #[test]
    fn test_operators() {
        let ctx = Context::new("u")
            .with_attribute("email", "dev@example.com")
            .with_attribute("age", 30)
            .with_attribute("groups", json!(["beta", "staff"]))
            .with_attribute("signup", "2024-01-15T00:00:00Z");

        let check = |attr: &str, op: Operator, value: Value| {
            clause_matches(&Clause::new(attr, op, vec![value]), &ctx)
        };

        assert!(check("email", Operator::StartsWith, json!("dev@")));
        assert!(check("email", Operator::Matches, json!("^[a-z]+@example\\.com$")));
        assert!(!check("email", Operator::Matches, json!("(unclosed")));
        assert!(check("age", Operator::In, json!(30.0)));
        assert!(check("age", Operator::LessThanOrEqual, json!(30)));
        assert!(!check("age", Operator::LessThan, json!(30)));
        assert!(check("age", Operator::GreaterThanOrEqual, json!(18)));
        assert!(check("groups", Operator::In, json!("staff")));
        assert!(check("signup", Operator::Before, json!("2024-02-01T00:00:00Z")));
        assert!(check("signup", Operator::After, json!(0)));
        assert!(check("kind", Operator::In, json!("user")));
        assert!(!check("age", Operator::StartsWith, json!("3")));
        assert!(!check("email", Operator::Unknown, json!("dev@example.com")));
    }

    #[test]
    fn test_negate_and_missing_attribute() {
        let ctx = Context::new("u").with_attribute("country", "NZ");
        let not_us = Clause::new("country", Operator::In, vec![json!("US")]).negated();
        assert!(clause_matches(&not_us, &ctx));

        let missing = Clause::new("region", Operator::In, vec![json!("x")]).negated();
        assert!(!clause_matches(&missing, &ctx));
    }

    #[test]
    fn test_reason_serialization() {
        let reason = Reason::RuleMatch {
            rule_index: 2,
            rule_id: Some("r".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&reason).unwrap(),
            json!({"kind": "RULE_MATCH", "ruleIndex": 2, "ruleId": "r"})
        );
        assert_eq!(
            serde_json::to_value(Reason::error(ErrorKind::FlagNotFound)).unwrap(),
            json!({"kind": "ERROR", "errorKind": "FLAG_NOT_FOUND"})
        );
        assert_eq!(serde_json::to_value(Reason::Off).unwrap(), json!({"kind": "OFF"}));
    }
}
