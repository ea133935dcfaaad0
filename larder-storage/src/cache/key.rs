//! Deterministic cache keys.
//!
//! Parameters are serialized to JSON with object keys sorted at every
//! depth, so two parameter sets with the same key/value pairs produce the
//! same key regardless of field or insertion order. The canonical text is
//! hashed to keep keys short and free of separator bytes.

use larder_core::{CacheError, LarderResult};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Build `"<prefix>:<sha256 hex of canonical params>"`.
///
/// Fails only when `params` cannot be represented as JSON, e.g. a map with
/// non-string keys or a `Serialize` impl that reports an error.
pub fn generate_key<P: Serialize + ?Sized>(prefix: &str, params: &P) -> LarderResult<String> {
    let value = serde_json::to_value(params).map_err(|e| CacheError::KeySerialization {
        prefix: prefix.to_string(),
        reason: e.to_string(),
    })?;

    let mut canonical = String::new();
    write_canonical(&value, &mut canonical);

    let digest = Sha256::digest(canonical.as_bytes());
    Ok(format!("{}:{}", prefix, hex::encode(digest)))
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (name, field)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(name.clone()).to_string());
                out.push(':');
                write_canonical(field, out);
            }
            out.push('}');
        }
        Value::Array(values) => {
            out.push('[');
            for (i, element) in values.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(element, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
