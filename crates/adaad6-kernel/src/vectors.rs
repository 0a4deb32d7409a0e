//! Deterministic evidence-DAG vectors
//!
//! A complete refusal-only DAG: the authority carries
//! `can_execute=false`, so the bundle is inadmissible with
//! `AUTHORITY_DENIED` even though every gate passes. Used by tests and
//! the CLI refusal demo.

use std::collections::BTreeMap;

use adaad6_crypto::hash::attach_hash;
use serde_json::{json, Value};

use crate::admissibility::RefusalMode;
use crate::failures::Outcome;
use crate::record::make_refusal_record;

/// A fully materialized refusal DAG plus a node map usable as a resolver.
#[derive(Debug, Clone)]
pub struct RefusalVector {
    pub authority: Value,
    pub proposal: Value,
    pub gate_results: Vec<Value>,
    pub capability_token: Value,
    pub counterfactual: Value,
    pub evidence_bundle: Value,
    pub refusal_record: Value,
    pub nodes: BTreeMap<String, Value>,
}

/// Build the refusal-only dry-run vector.
pub fn refusal_vector() -> Outcome<RefusalVector> {
    let authority = attach_hash(&json!({
        "type": "AuthoritySource",
        "version": "1",
        "authority_domain": "local_operator",
        "mandate": "Refusal-only dry run",
        "scope": {
            "can_execute": false,
            "can_issue_capabilities": false,
        },
    }));

    let proposal = attach_hash(&json!({
        "type": "Proposal",
        "version": "1",
        "proposal_kind": "adapter_call",
        "adapter": "echo",
        "intent": "refusal_demo",
        "inputs": {"message": "refuse"},
        "requested_effects": ["log_refusal"],
        "counterfactual_budget": 3,
    }));

    let gate_results = vec![
        attach_hash(&json!({
            "type": "GateResult",
            "version": "1",
            "gate_id": "success-justification",
            "result": "PASS",
            "deterministic": true,
            "detail": "Success justification satisfied",
        })),
        attach_hash(&json!({
            "type": "GateResult",
            "version": "1",
            "gate_id": "capability-alignment",
            "result": "PASS",
            "deterministic": true,
            "detail": "Capabilities confined",
        })),
        attach_hash(&json!({
            "type": "GateResult",
            "version": "1",
            "gate_id": "determinism-check",
            "result": "PASS",
            "deterministic": true,
            "detail": "Inputs deterministic",
        })),
    ];

    let capability_token = attach_hash(&json!({
        "type": "CapabilityToken",
        "version": "1",
        "authority_hash": authority["hash"],
        "scopes": ["call_adapter:echo"],
        "decay_only": true,
        "limits": {
            "expires_at": "2026-01-01T00:00:00Z",
            "max_calls": 1,
        },
    }));

    let counterfactual = attach_hash(&json!({
        "type": "CounterfactualSummary",
        "version": "1",
        "budget": 3,
        "rejected": [
            {"alt": "do_nothing", "reason": "fails_success_necessity"},
            {"alt": "delegate", "reason": "off-policy"},
        ],
        "unlisted_commitment": "no-other-branches",
    }));

    let evidence_bundle = attach_hash(&json!({
        "type": "EvidenceBundle",
        "version": "1",
        "authority_hash": authority["hash"],
        "proposal_hash": proposal["hash"],
        "gate_result_hashes": gate_results.iter().map(|g| g["hash"].clone()).collect::<Vec<_>>(),
        "capability_hashes": [capability_token["hash"].clone()],
        "counterfactual_hash": counterfactual["hash"],
        "will_emit_execution_record": true,
    }));

    let bundle_hash = evidence_bundle["hash"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let refusal_record = make_refusal_record(&bundle_hash, RefusalMode::AuthorityDenied, None)?;

    let mut nodes = BTreeMap::new();
    for node in [&authority, &proposal, &capability_token, &counterfactual, &evidence_bundle, &refusal_record]
        .into_iter()
        .chain(gate_results.iter())
    {
        if let Some(hash) = node["hash"].as_str() {
            nodes.insert(hash.to_string(), node.clone());
        }
    }

    Ok(RefusalVector {
        authority,
        proposal,
        gate_results,
        capability_token,
        counterfactual,
        evidence_bundle,
        refusal_record,
        nodes,
    })
}
