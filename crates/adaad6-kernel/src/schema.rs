//! DAG node schema validation
//!
//! Nodes arrive as untrusted JSON out of a resolver; validation never
//! assumes shape. Each validator raises the crash code the failure class
//! demands: absent fields are `EVIDENCE_MISSING`, wrong shapes are
//! `INTEGRITY_VIOLATION`, and gate nondeterminism is `DETERMINISM_BREACH`.

use serde_json::Value;

use crate::failures::{KernelCrash, Outcome};

fn require_fields(obj: &Value, fields: &[&str]) -> Outcome<()> {
    for field in fields {
        if obj.get(field).is_none() {
            return Err(KernelCrash::evidence(format!(
                "Missing required field: {field}"
            )));
        }
    }
    Ok(())
}

fn require_str<'a>(obj: &'a Value, field: &str) -> Outcome<&'a str> {
    obj.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| KernelCrash::integrity(format!("{field} must be a string")))
}

fn require_bool(obj: &Value, field: &str) -> Outcome<bool> {
    obj.get(field)
        .and_then(Value::as_bool)
        .ok_or_else(|| KernelCrash::integrity(format!("{field} must be a boolean")))
}

fn require_type(obj: &Value, expected: &str) -> Outcome<()> {
    if obj.get("type").and_then(Value::as_str) != Some(expected) {
        return Err(KernelCrash::integrity(format!("Invalid {expected} type")));
    }
    Ok(())
}

pub fn validate_authority_source(obj: &Value) -> Outcome<()> {
    require_fields(obj, &["type", "version", "authority_domain", "scope", "mandate"])?;
    require_type(obj, "AuthoritySource")?;
    // authority_domain is the liability domain identifier
    if require_str(obj, "authority_domain")?.is_empty() {
        return Err(KernelCrash::integrity("authority_domain must be set"));
    }
    if require_str(obj, "mandate")?.is_empty() {
        return Err(KernelCrash::integrity("mandate must be set"));
    }
    let scope = obj
        .get("scope")
        .and_then(Value::as_object)
        .ok_or_else(|| KernelCrash::integrity("scope must be an object"))?;
    if !scope.contains_key("can_execute") || !scope.contains_key("can_issue_capabilities") {
        return Err(KernelCrash::evidence("scope missing required flags"));
    }
    let scope_value = Value::Object(scope.clone());
    require_bool(&scope_value, "can_execute")?;
    require_bool(&scope_value, "can_issue_capabilities")?;
    Ok(())
}

pub fn validate_proposal(obj: &Value) -> Outcome<()> {
    require_fields(obj, &["type", "version", "proposal_kind"])?;
    require_type(obj, "Proposal")?;
    if obj.get("proposal_kind").and_then(Value::as_str) == Some("adapter_call") {
        require_fields(
            obj,
            &["adapter", "intent", "inputs", "requested_effects", "counterfactual_budget"],
        )?;
    }
    Ok(())
}

pub fn validate_gate_result(obj: &Value) -> Outcome<()> {
    require_fields(obj, &["type", "version", "gate_id", "result", "deterministic"])?;
    require_type(obj, "GateResult")?;
    match obj.get("result").and_then(Value::as_str) {
        Some("PASS") | Some("FAIL") => {}
        _ => {
            return Err(KernelCrash::determinism("Gate result must be PASS or FAIL"));
        }
    }
    if obj.get("deterministic") != Some(&Value::Bool(true)) {
        return Err(KernelCrash::determinism("Gate must be deterministic"));
    }
    Ok(())
}

pub fn validate_capability_token(obj: &Value) -> Outcome<()> {
    require_fields(
        obj,
        &["type", "version", "authority_hash", "decay_only", "limits", "scopes"],
    )?;
    require_type(obj, "CapabilityToken")?;
    require_str(obj, "authority_hash")?;
    require_bool(obj, "decay_only")?;
    if obj.get("decay_only") != Some(&Value::Bool(true)) {
        return Err(KernelCrash::integrity("decay_only must be true"));
    }
    let limits = obj
        .get("limits")
        .and_then(Value::as_object)
        .ok_or_else(|| KernelCrash::integrity("limits must be an object"))?;
    if !limits.contains_key("expires_at") || !limits.contains_key("max_calls") {
        return Err(KernelCrash::evidence("limits missing required fields"));
    }
    let limits_value = Value::Object(limits.clone());
    require_str(&limits_value, "expires_at")?;
    let max_calls = limits_value
        .get("max_calls")
        .and_then(Value::as_i64)
        .ok_or_else(|| KernelCrash::integrity("limits.max_calls must be an integer"))?;
    if max_calls < 1 {
        return Err(KernelCrash::integrity("limits.max_calls must be >= 1"));
    }
    let scopes = obj
        .get("scopes")
        .and_then(Value::as_array)
        .ok_or_else(|| KernelCrash::integrity("scopes must be a list"))?;
    if scopes.is_empty() {
        return Err(KernelCrash::integrity("scopes must be non-empty"));
    }
    for scope in scopes {
        if !scope.is_string() {
            return Err(KernelCrash::integrity("scopes[] must be strings"));
        }
    }
    Ok(())
}

pub fn validate_counterfactual_summary(obj: &Value) -> Outcome<()> {
    require_fields(obj, &["type", "version", "budget", "rejected", "unlisted_commitment"])?;
    require_type(obj, "CounterfactualSummary")?;
    let budget = obj
        .get("budget")
        .and_then(Value::as_i64)
        .ok_or_else(|| KernelCrash::integrity("budget must be an integer"))?;
    if budget < 0 {
        return Err(KernelCrash::integrity("budget must be non-negative"));
    }
    let rejected = obj
        .get("rejected")
        .and_then(Value::as_array)
        .ok_or_else(|| KernelCrash::integrity("rejected must be a list"))?;
    if rejected.len() as i64 > budget {
        return Err(KernelCrash::integrity("rejected count exceeds budget"));
    }
    for item in rejected {
        if !item.is_object() {
            return Err(KernelCrash::integrity("rejected[] must be objects"));
        }
        require_fields(item, &["alt", "reason"])?;
        require_str(item, "alt")?;
        require_str(item, "reason")?;
    }
    require_str(obj, "unlisted_commitment")?;
    Ok(())
}

pub fn validate_evidence_bundle(obj: &Value) -> Outcome<()> {
    require_fields(
        obj,
        &[
            "type",
            "version",
            "authority_hash",
            "proposal_hash",
            "gate_result_hashes",
            "capability_hashes",
            "counterfactual_hash",
            "will_emit_execution_record",
        ],
    )?;
    require_type(obj, "EvidenceBundle")?;
    if !obj
        .get("gate_result_hashes")
        .map(Value::is_array)
        .unwrap_or(false)
    {
        return Err(KernelCrash::integrity("gate_result_hashes must be a list"));
    }
    if !obj
        .get("capability_hashes")
        .map(Value::is_array)
        .unwrap_or(false)
    {
        return Err(KernelCrash::integrity("capability_hashes must be a list"));
    }
    require_bool(obj, "will_emit_execution_record")?;
    Ok(())
}

pub fn validate_execution_record(obj: &Value) -> Outcome<()> {
    require_fields(
        obj,
        &["type", "version", "evidence_bundle_hash", "outcome", "reason", "refusal_mode"],
    )?;
    require_type(obj, "ExecutionRecord")?;
    match obj.get("refusal_mode").and_then(Value::as_str) {
        Some("AUTHORITY_DENIED") => Ok(()),
        Some("GATE_FAIL") => {
            let failed = obj.get("failed_gate_id").and_then(Value::as_str);
            if failed.map(str::is_empty).unwrap_or(true) {
                return Err(KernelCrash::integrity("failed_gate_id required for GATE_FAIL"));
            }
            Ok(())
        }
        _ => Err(KernelCrash::integrity("Invalid refusal_mode")),
    }
}
