//! Stable rollout bucketing.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::context::Context;
use crate::flag::{Rollout, WEIGHT_SCALE};

const LONG_SCALE: f64 = 0xFFF_FFFF_FFFF_FFFFu64 as f64;

/// Place a context in `[0, 1)` for a flag.
///
/// The bucket depends only on the flag key, the salt and the bucketing
/// value, so it is stable across processes and flag edits.
pub fn bucket_context(flag_key: &str, salt: &str, context: &Context, bucket_by: Option<&str>) -> f64 {
    let value = match bucket_by {
        Some(attribute) => context.get(attribute).and_then(|v| bucketable(&v)),
        None => Some(context.key().to_string()),
    };

    value.map_or(0.0, |v| bucket_value(flag_key, salt, &v))
}

/// Hash `{flag_key}.{salt}.{value}` into `[0, 1)`.
pub fn bucket_value(flag_key: &str, salt: &str, value: &str) -> f64 {
    let mut hasher = Sha256::new();
    hasher.update(flag_key.as_bytes());
    hasher.update(b".");
    hasher.update(salt.as_bytes());
    hasher.update(b".");
    hasher.update(value.as_bytes());
    let digest = hasher.finalize();

    // First 15 hex digits = 60 bits
    let hex = hex::encode(&digest[..8]);
    let prefix = u64::from_str_radix(&hex[..15], 16).unwrap_or(0);
    prefix as f64 / LONG_SCALE
}

// Only strings and integers bucket; anything else lands in bucket 0.
fn bucketable(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

/// Pick a variation index for `bucket`. Contexts past the last cumulative
/// weight fall into the last variation.
pub fn select_variation(rollout: &Rollout, bucket: f64) -> Option<usize> {
    let mut cumulative = 0.0;
    for weighted in &rollout.variations {
        cumulative += f64::from(weighted.weight) / f64::from(WEIGHT_SCALE);
        if bucket < cumulative {
            return Some(weighted.variation);
        }
    }
    rollout.variations.last().map(|w| w.variation)
}
