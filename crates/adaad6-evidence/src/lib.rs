//! ADAAD-6 Evidence - Content-addressed lineage registry
//!
//! The store retains lineage nodes keyed by their canonical hash and
//! refuses to return nodes whose hash no longer matches their contents.
//! Rewrites are therefore refused by construction: a stored node that has
//! been altered simply stops resolving.
//!
//! The cryovant lineage gate binds a gate verdict to the lineage it
//! proved. Downstream consumers that accept a precomputed gate must
//! re-check the hash equivalence and that the store still resolves it.

use std::collections::BTreeMap;

use adaad6_crypto::hash::{hash_object, node_body};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of a lineage gate check. A failed gate is data, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageGateResult {
    pub ok: bool,
    pub reason: Option<String>,
    pub lineage_hash: Option<String>,
}

impl LineageGateResult {
    pub fn pass(lineage_hash: impl Into<String>) -> Self {
        Self {
            ok: true,
            reason: None,
            lineage_hash: Some(lineage_hash.into()),
        }
    }

    pub fn fail(reason: &str, lineage_hash: Option<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.to_string()),
            lineage_hash,
        }
    }
}

/// Append-only content-addressed map of lineage nodes.
#[derive(Debug, Clone, Default)]
pub struct EvidenceStore {
    lineages: BTreeMap<String, Value>,
}

impl EvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a lineage node under its canonical hash and return the hash.
    pub fn add_lineage(&mut self, payload: &Value) -> String {
        let mut body = node_body(payload);
        let lineage_hash = hash_object(&body);
        if let Value::Object(map) = &mut body {
            map.insert("hash".to_string(), Value::String(lineage_hash.clone()));
        }
        self.lineages.insert(lineage_hash.clone(), body);
        lineage_hash
    }

    /// Resolve a lineage, re-checking the stored hash against a recomputed
    /// one. Tampered or mis-keyed nodes resolve to `None`.
    pub fn resolve_lineage(&self, lineage_hash: &str) -> Option<Value> {
        let node = self.lineages.get(lineage_hash)?;
        let expected = hash_object(&node_body(node));
        if node.get("hash").and_then(Value::as_str) != Some(expected.as_str())
            || lineage_hash != expected
        {
            return None;
        }
        Some(node.clone())
    }

    pub fn len(&self) -> usize {
        self.lineages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lineages.is_empty()
    }

    /// Test-only escape hatch for corrupting a stored node in place.
    #[doc(hidden)]
    pub fn tamper(&mut self, lineage_hash: &str, edit: impl FnOnce(&mut Value)) {
        if let Some(node) = self.lineages.get_mut(lineage_hash) {
            edit(node);
        }
    }
}

/// Check that a claimed lineage hash resolves inside the evidence store
/// and re-hashes to itself.
pub fn cryovant_lineage_gate(
    evidence_store: Option<&EvidenceStore>,
    lineage_hash: Option<&str>,
) -> LineageGateResult {
    let Some(lineage_hash) = lineage_hash.map(str::trim).filter(|h| !h.is_empty()) else {
        return LineageGateResult::fail("cryovant_lineage_missing", None);
    };
    let Some(store) = evidence_store else {
        return LineageGateResult::fail(
            "cryovant_evidence_store_missing",
            Some(lineage_hash.to_string()),
        );
    };
    let Some(lineage) = store.resolve_lineage(lineage_hash) else {
        return LineageGateResult::fail(
            "cryovant_lineage_unknown",
            Some(lineage_hash.to_string()),
        );
    };
    if hash_object(&node_body(&lineage)) != lineage_hash {
        return LineageGateResult::fail(
            "cryovant_lineage_hash_mismatch",
            Some(lineage_hash.to_string()),
        );
    }
    LineageGateResult::pass(lineage_hash)
}
