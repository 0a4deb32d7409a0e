//! Admissibility evaluation over a resolved evidence DAG
//!
//! The walk resolves every hash the bundle references, re-hashes each node
//! against its address, validates it, and folds the result into one of
//! three answers: admissible, `AUTHORITY_DENIED`, or `GATE_FAIL`.
//! `AUTHORITY_DENIED` dominates.

use std::collections::BTreeMap;

use adaad6_crypto::hash::{hash_object, node_body};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::failures::{KernelCrash, Outcome};
use crate::schema::{
    validate_authority_source, validate_capability_token, validate_counterfactual_summary,
    validate_evidence_bundle, validate_gate_result, validate_proposal,
};

/// Why an inadmissible bundle was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefusalMode {
    AuthorityDenied,
    GateFail,
}

impl RefusalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefusalMode::AuthorityDenied => "AUTHORITY_DENIED",
            RefusalMode::GateFail => "GATE_FAIL",
        }
    }
}

/// Source of DAG nodes, keyed by content hash.
pub trait NodeResolver {
    fn resolve(&self, hash: &str) -> Option<Value>;
}

impl NodeResolver for BTreeMap<String, Value> {
    fn resolve(&self, hash: &str) -> Option<Value> {
        self.get(hash).cloned()
    }
}

impl<F> NodeResolver for F
where
    F: Fn(&str) -> Option<Value>,
{
    fn resolve(&self, hash: &str) -> Option<Value> {
        self(hash)
    }
}

fn resolve_checked<R: NodeResolver + ?Sized>(
    resolver: &R,
    expected_hash: &str,
    what: &str,
) -> Outcome<Value> {
    if expected_hash.is_empty() {
        return Err(KernelCrash::evidence(format!("Missing hash for {what}")));
    }
    let node = resolver
        .resolve(expected_hash)
        .ok_or_else(|| KernelCrash::evidence(format!("Missing node for {what}")))?;
    if hash_object(&node_body(&node)) != expected_hash {
        return Err(KernelCrash::integrity(format!("Hash mismatch for {what}")));
    }
    Ok(node)
}

fn require_hash_field(bundle: &Value, field: &str, what: &str) -> Outcome<String> {
    bundle
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| KernelCrash::evidence(format!("Missing hash for {what}")))
}

fn evaluate<R: NodeResolver + ?Sized>(
    bundle: &Value,
    resolver: &R,
) -> Outcome<Option<RefusalMode>> {
    let stored_hash = bundle
        .get("hash")
        .and_then(Value::as_str)
        .ok_or_else(|| KernelCrash::evidence("Evidence bundle missing hash"))?;
    if hash_object(&node_body(bundle)) != stored_hash {
        return Err(KernelCrash::integrity("Evidence bundle hash mismatch"));
    }

    validate_evidence_bundle(bundle)?;
    let authority_hash = require_hash_field(bundle, "authority_hash", "authority")?;

    let authority = resolve_checked(resolver, &authority_hash, "authority")?;
    validate_authority_source(&authority)?;
    let authority_denied =
        authority["scope"].get("can_execute") == Some(&Value::Bool(false));

    let proposal_hash = require_hash_field(bundle, "proposal_hash", "proposal")?;
    let proposal = resolve_checked(resolver, &proposal_hash, "proposal")?;
    validate_proposal(&proposal)?;

    let counterfactual_hash = require_hash_field(bundle, "counterfactual_hash", "counterfactual")?;
    let counterfactual = resolve_checked(resolver, &counterfactual_hash, "counterfactual")?;
    validate_counterfactual_summary(&counterfactual)?;

    let mut gate_failed = false;
    for gate_hash in bundle["gate_result_hashes"].as_array().into_iter().flatten() {
        let gate_hash = gate_hash
            .as_str()
            .ok_or_else(|| KernelCrash::integrity("gate_result_hashes[] must be strings"))?;
        let gate = resolve_checked(resolver, gate_hash, "gate")?;
        validate_gate_result(&gate)?;
        if gate.get("result").and_then(Value::as_str) == Some("FAIL") {
            gate_failed = true;
        }
    }

    for cap_hash in bundle["capability_hashes"].as_array().into_iter().flatten() {
        let cap_hash = cap_hash
            .as_str()
            .ok_or_else(|| KernelCrash::integrity("capability_hashes[] must be strings"))?;
        let token = resolve_checked(resolver, cap_hash, "capability token")?;
        validate_capability_token(&token)?;
        if token.get("authority_hash").and_then(Value::as_str) != Some(authority_hash.as_str()) {
            return Err(KernelCrash::integrity("Capability token authority mismatch"));
        }
    }

    if bundle.get("will_emit_execution_record") != Some(&Value::Bool(true)) {
        return Err(KernelCrash::unlogged("Execution record emission disabled"));
    }

    // AUTHORITY_DENIED dominates GATE_FAIL.
    let mode = if authority_denied {
        Some(RefusalMode::AuthorityDenied)
    } else if gate_failed {
        Some(RefusalMode::GateFail)
    } else {
        None
    };
    Ok(mode)
}

/// Whether the bundle authorizes execution.
pub fn is_admissible<R: NodeResolver + ?Sized>(bundle: &Value, resolver: &R) -> Outcome<bool> {
    Ok(evaluate(bundle, resolver)?.is_none())
}

/// The refusal mode of an inadmissible bundle, or `None` when admissible.
pub fn refusal_mode<R: NodeResolver + ?Sized>(
    bundle: &Value,
    resolver: &R,
) -> Outcome<Option<RefusalMode>> {
    evaluate(bundle, resolver)
}
