//! Integration tests for flagstore-core

use flagstore_core::*;
use serde_json::json;

fn checkout_flag() -> FlagDefinition {
    serde_json::from_value(json!({
        "key": "checkout-v2",
        "enabled": true,
        "variations": ["legacy", "v2", "v2-beta"],
        "defaultVariation": 0,
        "targets": [{"values": ["qa-1", "qa-2"], "variation": 2}],
        "rules": [
            {
                "id": "internal",
                "clauses": [{"attribute": "email", "op": "endsWith", "values": ["@corp.com"]}],
                "variation": 1
            },
            {
                "id": "eu-rollout",
                "clauses": [{"attribute": "country", "op": "in", "values": ["DE", "FR"]}],
                "rollout": {"variations": [
                    {"variation": 1, "weight": 20000},
                    {"variation": 0, "weight": 80000}
                ]}
            }
        ],
        "fallthrough": {"variation": 0},
        "version": 12
    }))
    .unwrap()
}

#[test]
fn test_evaluation_order() {
    let flag = checkout_flag();

    let qa = Context::new("qa-1").with_attribute("email", "qa@corp.com");
    assert_eq!(flag.evaluate(&qa).unwrap().reason, Reason::TargetMatch);

    let staff = Context::new("u1").with_attribute("email", "me@corp.com");
    let result = flag.evaluate(&staff).unwrap();
    assert_eq!(result.value, FlagValue::from("v2"));
    assert_eq!(
        result.reason,
        Reason::RuleMatch {
            rule_index: 0,
            rule_id: Some("internal".to_string())
        }
    );

    let anon = Context::new("u2");
    let result = flag.evaluate(&anon).unwrap();
    assert_eq!(result.value, FlagValue::from("legacy"));
    assert_eq!(result.reason, Reason::Fallthrough);
}

#[test]
fn test_rule_rollout_is_deterministic() {
    let flag = checkout_flag();
    let ctx = Context::new("user-77").with_attribute("country", "DE");

    let first = flag.evaluate(&ctx).unwrap();
    for _ in 0..10 {
        assert_eq!(flag.evaluate(&ctx).unwrap(), first);
    }
    assert!(matches!(first.reason, Reason::RuleMatch { rule_index: 1, .. }));
}

#[test]
fn test_value_is_variation_or_fallback() {
    let flag = checkout_flag();
    let fallback = FlagValue::from("fallback");

    for i in 0..200 {
        let ctx = Context::new(format!("user-{}", i)).with_attribute("country", "FR");
        let result = flag.evaluate_or(&ctx, fallback.clone());
        assert!(flag.variations.contains(&result.value));
    }

    let result = flag.evaluate_or(&Context::new(""), fallback.clone());
    assert_eq!(result.value, fallback);
}

#[test]
fn test_context_from_request_body() {
    let ctx: Context = serde_json::from_value(json!({
        "key": "user-9",
        "name": "Grace",
        "kind": "user",
        "email": "grace@corp.com",
        "groups": ["admins"]
    }))
    .unwrap();

    assert!(ctx.is_valid());
    assert_eq!(ctx.name(), Some("Grace"));

    let flag = FlagDefinition::boolean("admin-panel", false).with_rule(
        Rule::new(VariationOrRollout::Variation(1))
            .with_clause(Clause::new("groups", Operator::In, vec![json!("admins")])),
    );
    assert_eq!(flag.evaluate(&ctx).unwrap().value, FlagValue::Bool(true));
}

#[test]
fn test_bootstrap_state() {
    let ctx = Context::new("user-1");
    let mut state = FlagsState::new();

    for flag in [checkout_flag(), FlagDefinition::boolean("dark-mode", true)] {
        let result = flag.evaluate(&ctx).unwrap();
        state.add(flag.key.clone(), flag.version, result);
    }

    let json = serde_json::to_value(&state).unwrap();
    assert_eq!(json["checkout-v2"], json!("legacy"));
    assert_eq!(json["dark-mode"], json!(true));
    assert_eq!(json["$flagsState"]["checkout-v2"]["version"], json!(12));
    assert_eq!(json["$valid"], json!(true));
}

#[test]
fn test_definition_roundtrip_preserves_semantics() {
    let flag = checkout_flag();
    let text = serde_json::to_string(&flag).unwrap();
    let back: FlagDefinition = serde_json::from_str(&text).unwrap();
    assert_eq!(back, flag);
}
