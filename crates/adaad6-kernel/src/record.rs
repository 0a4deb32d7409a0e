//! Refusal records
//!
//! An executor that would act on a refused bundle must build and record
//! one of these instead of raising.

use adaad6_crypto::hash::attach_hash;
use serde_json::{json, Value};

use crate::admissibility::RefusalMode;
use crate::failures::Outcome;
use crate::schema::validate_execution_record;

/// Build a validated, hash-attached `ExecutionRecord` for a refusal.
pub fn make_refusal_record(
    bundle_hash: &str,
    refusal_mode: RefusalMode,
    failed_gate_id: Option<&str>,
) -> Outcome<Value> {
    let mut record = json!({
        "type": "ExecutionRecord",
        "version": "1",
        "evidence_bundle_hash": bundle_hash,
        "outcome": "REFUSED",
        "reason": "REFUSAL",
        "refusal_mode": refusal_mode.as_str(),
    });
    if refusal_mode == RefusalMode::GateFail {
        record["failed_gate_id"] = json!(failed_gate_id);
    }
    validate_execution_record(&record)?;
    Ok(attach_hash(&record))
}
