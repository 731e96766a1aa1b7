//! Canonical JSON and SHA-256 digests.
//!
//! Objects are serialized with keys in UTF-16 code unit order, arrays keep
//! their order, integer-valued floats collapse to integers. Two scenario sets
//! generated from the same seed, config and options share a
//! [`scenario_set_digest`] even though their ids differ.

use serde_json::{json, Map, Number, Value};
use sha2::{Digest, Sha256};

use crate::domain::{BenchError, Result, Scenario};

fn sort_keys_utf16(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| a.encode_utf16().cmp(b.encode_utf16()));

            let mut sorted = Map::new();
            for key in keys {
                if let Some(v) = map.get(key) {
                    sorted.insert(key.clone(), sort_keys_utf16(v));
                }
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys_utf16).collect()),
        other => other.clone(),
    }
}

fn normalize_value(value: &Value) -> Result<Value> {
    match value {
        Value::Object(map) => {
            let mut normalized = Map::new();
            for (k, v) in map {
                normalized.insert(k.clone(), normalize_value(v)?);
            }
            Ok(Value::Object(normalized))
        }
        Value::Array(items) => Ok(Value::Array(
            items.iter().map(normalize_value).collect::<Result<Vec<_>>>()?,
        )),
        Value::Number(n) if n.is_f64() => {
            let f = n.as_f64().unwrap_or(f64::NAN);
            if !f.is_finite() {
                return Err(BenchError::InvalidArtifact(
                    "NaN/Infinity not permitted in canonical JSON".to_string(),
                ));
            }
            if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                Ok(Value::Number(Number::from(f as i64)))
            } else {
                Ok(value.clone())
            }
        }
        other => Ok(other.clone()),
    }
}

/// Convert a JSON value to canonical form: normalize numbers, sort keys,
/// emit compact JSON.
pub fn canonical_json(value: &Value) -> Result<String> {
    let normalized = normalize_value(value)?;
    Ok(serde_json::to_string(&sort_keys_utf16(&normalized))?)
}

/// SHA-256 hex digest of the canonical form of `value`.
pub fn compute_digest(value: &Value) -> Result<String> {
    Ok(sha256_hex(canonical_json(value)?.as_bytes()))
}

/// SHA-256 hex digest of raw bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Digest of a scenario set's content, ids and narrative text excluded.
pub fn scenario_set_digest(scenarios: &[Scenario]) -> Result<String> {
    let content: Vec<Value> = scenarios
        .iter()
        .map(|s| {
            json!({
                "anchor": s.anchor,
                "deltas": s.deltas,
                "distractors": s.distractors,
                "groundTruth": s.ground_truth.value,
                "tolerance": s.ground_truth.tolerance,
                "twinRole": s.twin_role,
                "twinDeltaChanged": s.twin_delta_changed,
            })
        })
        .collect();
    compute_digest(&Value::Array(content))
}
