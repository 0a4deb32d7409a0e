//! SHA-256 content addressing over canonical JSON

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::canon::canonical_json;

/// Compute the lowercase hex SHA-256 of raw bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Content hash of a JSON value: SHA-256 over its canonical encoding.
pub fn hash_object(value: &Value) -> String {
    sha256_hex(canonical_json(value).as_bytes())
}

/// Shallow copy of a node with its `hash` field removed.
///
/// The invariant for every DAG node is
/// `hash == hash_object(node_body(node))`.
pub fn node_body(node: &Value) -> Value {
    let mut body = node.clone();
    if let Value::Object(map) = &mut body {
        map.remove("hash");
    }
    body
}

/// Return a copy of the node with its `hash` field set from the body.
pub fn attach_hash(node: &Value) -> Value {
    let mut body = node_body(node);
    let digest = hash_object(&body);
    if let Value::Object(map) = &mut body {
        map.insert("hash".to_string(), Value::String(digest));
    }
    body
}
