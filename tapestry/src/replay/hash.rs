//! Stable step hashing.
//!
//! A step hash identifies one capability call by `{capability_id, params}`.
//! JSON objects are serialized with recursively sorted keys so the hash does
//! not depend on insertion order anywhere in the parameter tree.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Hex SHA-256 over the canonical form of `{capability_id, params}`.
pub fn step_hash(capability_id: &str, params: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"capability_id:");
    hasher.update(capability_id.as_bytes());
    hasher.update(b"\nparams:");
    hasher.update(canonical_json(params).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Render a JSON value with object keys sorted at every level. Arrays keep
/// their order; scalars use serde_json's own formatting.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // keys are plain strings; serde_json handles escaping
                out.push_str(&serde_json::to_string(key).expect("string serializes"));
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => {
            out.push_str(&serde_json::to_string(scalar).expect("scalar serializes"));
        }
    }
}
