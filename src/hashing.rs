//! Hashing System - Canonical JSON and SHA-256 Digests
//!
//! The genesis document is always emitted in canonical form so that
//! equal configurations produce equal bytes.

use serde::Serialize;
use serde_json::{to_string, to_string_pretty, Value};
use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    to_string(&sort_value(&v))
}

/// Canonical key order, two-space indentation.
pub fn canonical_json_pretty<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    to_string_pretty(&sort_value(&v))
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let sorted_map: serde_json::Map<String, Value> = sorted
                .into_iter()
                .map(|(k, v)| (k.clone(), sort_value(v)))
                .collect();
            Value::Object(sorted_map)
        }
        Value::Array(arr) => {
            Value::Array(arr.iter().map(sort_value).collect())
        }
        _ => v.clone()
    }
}

/// Fields that change on every generation even when the config does not.
const TIMESTAMP_PATHS: [&[&str]; 4] = [
    &["timestamp"],
    &["config", "warpConfig", "blockTimestamp"],
    &["config", "feeManagerConfig", "blockTimestamp"],
    &["config", "rewardManagerConfig", "blockTimestamp"],
];

fn remove_path(value: &mut Value, path: &[&str]) {
    match path {
        [] => {}
        [last] => {
            if let Value::Object(map) = value {
                map.remove(*last);
            }
        }
        [head, rest @ ..] => {
            if let Some(child) = value.get_mut(*head) {
                remove_path(child, rest);
            }
        }
    }
}

/// Digest of the exact published text.
pub fn document_digest(text: &str) -> String {
    sha256_hex(text.as_bytes())
}

/// Digest of a genesis document with its timestamps stripped.
/// Two generations of the same config share a content digest.
pub fn content_digest(genesis: &Value) -> Result<String, serde_json::Error> {
    let mut stripped = genesis.clone();
    for path in TIMESTAMP_PATHS {
        remove_path(&mut stripped, path);
    }
    Ok(sha256_hex(canonical_json(&stripped)?.as_bytes()))
}
