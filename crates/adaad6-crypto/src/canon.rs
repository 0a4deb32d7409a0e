//! Canonical JSON encoding
//!
//! The stable byte form every hash in the system is computed over:
//! UTF-8, object keys sorted ascending by Unicode code point at every
//! level, no insignificant whitespace, integers without fractional parts,
//! floats in shortest round-trip form, arrays in order.
//!
//! Consumers that re-encode a canonical document must not alter key
//! ordering or whitespace, so no language-default serializer is trusted
//! here; the writer below is the single source of truth.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CanonError {
    #[error("value is not representable as canonical JSON: {0}")]
    Unrepresentable(String),
}

/// Encode a JSON value into its canonical string form.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Serialize any value and encode it canonically in one step.
pub fn to_canonical_value<T: Serialize>(value: &T) -> Result<Value, CanonError> {
    serde_json::to_value(value).map_err(|e| CanonError::Unrepresentable(e.to_string()))
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        // serde_json renders integers without a fractional part and floats
        // via ryu, which is the shortest round-trip form.
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            // UTF-8 byte order equals Unicode code point order.
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
