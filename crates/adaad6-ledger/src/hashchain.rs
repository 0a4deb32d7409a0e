//! Hash chain over ledger events
//!
//! Each event's `hash` covers the event minus the `hash` field itself;
//! `prev_hash` binds it to the preceding event (null at genesis).

use adaad6_crypto::hash::{hash_object, node_body};
use serde_json::Value;

/// Hash an event that does not yet carry its `hash` field.
pub fn compute_event_hash(event_without_hash: &Value) -> String {
    hash_object(event_without_hash)
}

/// Walk a sequence of events and confirm both the per-event hash and the
/// prev-hash linkage. Any mismatch, reordering, or payload edit flips the
/// result to false.
pub fn verify_chain<'a, I>(events: I) -> bool
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut previous_hash: Option<String> = None;

    for (index, event) in events.into_iter().enumerate() {
        let stored_hash = match event.get("hash").and_then(Value::as_str) {
            Some(h) => h.to_string(),
            None => return false,
        };
        if compute_event_hash(&node_body(event)) != stored_hash {
            return false;
        }

        let prev = event.get("prev_hash");
        if index == 0 {
            let genesis = matches!(prev, None | Some(Value::Null))
                || matches!(prev, Some(Value::String(s)) if s.is_empty());
            if !genesis {
                return false;
            }
        } else if prev.and_then(Value::as_str) != previous_hash.as_deref() {
            return false;
        }

        previous_hash = Some(stored_hash);
    }

    true
}
