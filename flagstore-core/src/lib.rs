//! Flag model and evaluator for flagstore
//!
//! Versioned flag definitions, evaluation contexts, and a pure, deterministic
//! evaluator. Nothing in this crate performs I/O.
//!
//! # Features
//!
//! - **Targeting** - Individual context targets and ordered rules
//! - **Clauses** - String, regex, numeric and date operators
//! - **Rollouts** - Stable percentage splits by SHA-256 bucketing
//! - **Bootstrap** - [`FlagsState`] for all flags at once
//!
//! # Quick Start
//!
//! ```
//! use flagstore_core::*;
//! use serde_json::json;
//!
//! let rule = Rule::new(VariationOrRollout::Variation(1))
//!     .with_clause(Clause::new("email", Operator::EndsWith, vec![json!("@corp.com")]));
//!
//! let flag = FlagDefinition::boolean("beta-feature", false).with_rule(rule);
//!
//! let staff = Context::new("user-1").with_attribute("email", "ada@corp.com");
//! let result = flag.evaluate(&staff).unwrap();
//! assert_eq!(result.value.as_bool(), Some(true));
//! assert!(matches!(result.reason, Reason::RuleMatch { rule_index: 0, .. }));
//! ```
//!
//! # Gradual Rollout
//!
//! ```
//! use flagstore_core::*;
//!
//! // Serve `true` to 25% of contexts
//! let flag = FlagDefinition::boolean("new-algorithm", false)
//!     .with_fallthrough(VariationOrRollout::Rollout(Rollout::percentage(25, 1, 0)));
//!
//! let fallback = FlagValue::from(false);
//! let result = flag.evaluate_or(&Context::new("user-42"), fallback);
//! assert!(result.variation_index.is_some());
//! ```

pub mod bucket;
pub mod context;
pub mod error;
pub mod eval;
pub mod flag;
pub mod state;
pub mod value;

pub use bucket::{bucket_context, bucket_value, select_variation};
pub use context::{Context, ContextBuilder, DEFAULT_KIND};
pub use error::{ContextError, EvalError, Result};
pub use eval::{clause_matches, ErrorKind, EvaluationResult, Reason};
pub use flag::{
    Clause, FlagDefinition, Operator, Rollout, Rule, Target, VariationOrRollout,
    WeightedVariation, WEIGHT_SCALE,
};
pub use state::{FlagState, FlagsState};
pub use value::FlagValue;
