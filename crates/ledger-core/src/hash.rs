//! Canonical SHA-256 digests.
//!
//! Values are turned into JSON with every object's keys sorted before
//! hashing, so the digest depends only on content and never on field order.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Canonical JSON encoding of `value` (sorted object keys, compact).
///
/// # Panics
///
/// If `value` cannot be represented as JSON (e.g. a map with non-string
/// keys). Ledger types always can; failing here is a programming error.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Vec<u8> {
    let value = serde_json::to_value(value).expect("ledger values always serialize to JSON");
    serde_json::to_vec(&canonicalize(value)).expect("JSON values always encode")
}

/// Digest of the canonical JSON encoding of `value`.
pub fn hash_value<T: Serialize + ?Sized>(value: &T) -> String {
    sha256_hex(&canonical_json(value))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize(v)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
