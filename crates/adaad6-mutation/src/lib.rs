//! ADAAD-6 Mutation - Sandboxed candidate mutation
//!
//! Given a candidate source, produce a [`MutationReport`] describing the
//! mutated source and whether it may be promoted. Three gates guard the
//! attempt (mutation policy, resource tier, cryovant lineage); the
//! mutated source must pass an import allowlist and execute cleanly in an
//! isolated worker before promotion is even considered, and promotion
//! additionally requires the evolutionary policy, the server tier, and a
//! passing doctor verdict.

pub mod ast;
pub mod interp;
pub mod sandbox;

mod action;

pub use action::MutateCode;
pub use sandbox::{execute_in_sandbox, SandboxOutcome, SANDBOX_MEMORY_BYTES, WORKER_ENV};

use std::path::Path;

use adaad6_config::{AdaadConfig, MutationPolicy, ResourceTier};
use adaad6_evidence::{cryovant_lineage_gate, EvidenceStore};
use adaad6_kernel::{KernelCrash, Outcome};
use adaad6_ledger::{append_event, utc_now_iso_z};
use serde_json::{json, Map, Value};

/// The only modules a mutated source may import.
pub const ALLOWED_IMPORTS: [&str; 10] = [
    "math",
    "json",
    "re",
    "statistics",
    "decimal",
    "fractions",
    "typing",
    "itertools",
    "functools",
    "operator",
];

#[derive(Debug, Clone)]
pub struct MutationReport {
    pub mutated_src: String,
    pub score: f64,
    pub ast_ok: bool,
    pub sandbox_ok: bool,
    pub timeout: bool,
    pub allowlist_ok: bool,
    pub skipped: bool,
    pub reason: Option<String>,
    pub ledger_event: Option<Value>,
    pub mutation_kind: Option<String>,
    pub auto_promote: bool,
    pub doctor_gate_ok: bool,
    pub resource_caps: Option<Value>,
}

impl MutationReport {
    fn skipped(src: &str, reason: &str) -> Self {
        Self {
            mutated_src: src.to_string(),
            score: 0.0,
            ast_ok: false,
            sandbox_ok: false,
            timeout: false,
            allowlist_ok: false,
            skipped: true,
            reason: Some(reason.to_string()),
            ledger_event: None,
            mutation_kind: None,
            auto_promote: false,
            doctor_gate_ok: false,
            resource_caps: None,
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "mutated_src": self.mutated_src,
            "score": self.score,
            "ast_ok": self.ast_ok,
            "sandbox_ok": self.sandbox_ok,
            "timeout": self.timeout,
            "allowlist_ok": self.allowlist_ok,
            "skipped": self.skipped,
            "reason": self.reason,
            "ledger_event": self.ledger_event,
            "mutation_kind": self.mutation_kind,
            "auto_promote": self.auto_promote,
            "doctor_gate_ok": self.doctor_gate_ok,
            "resource_caps": self.resource_caps,
        })
    }
}

/// Normalize a candidate source: non-empty, exactly one trailing newline.
pub fn coerce_source(raw: &str) -> Outcome<String> {
    let trimmed = raw.trim_matches('\n');
    if trimmed.trim().is_empty() {
        return Err(KernelCrash::integrity("src must not be empty"));
    }
    Ok(format!("{trimmed}\n"))
}

/// Clamp a requested timeout into the configured planner budget.
pub fn coerce_timeout(raw: Option<f64>, cfg: &AdaadConfig) -> Outcome<f64> {
    match raw {
        None => Ok(1.0_f64.min(cfg.planner_max_seconds)),
        Some(timeout) => {
            if !timeout.is_finite() || timeout <= 0.0 {
                return Err(KernelCrash::integrity("timeout must be positive"));
            }
            Ok(timeout.min(cfg.planner_max_seconds.max(0.01)))
        }
    }
}

/// The gate reasons that skip a mutation attempt before any work happens.
pub fn skip_reason(
    cfg: &AdaadConfig,
    evidence_store: Option<&EvidenceStore>,
    lineage_hash: Option<&str>,
) -> Option<String> {
    if cfg.mutation_policy == MutationPolicy::Locked {
        return Some("mutation_policy_locked".to_string());
    }
    if cfg.resource_tier == ResourceTier::Mobile {
        return Some("resource_tier=mobile".to_string());
    }
    let effective = lineage_hash
        .filter(|h| !h.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| cfg.readiness_gate_sig.clone());
    let gate = cryovant_lineage_gate(evidence_store, Some(&effective));
    if !gate.ok {
        return Some(
            gate.reason
                .unwrap_or_else(|| "cryovant_lineage_blocked".to_string()),
        );
    }
    None
}

fn doctor_gate(cfg: &AdaadConfig) -> (bool, Option<String>) {
    let report_path = Path::new(&cfg.home)
        .join(".adaad")
        .join("doctor")
        .join("latest.json");
    if !report_path.exists() {
        return (false, Some("doctor_report_missing".to_string()));
    }
    let contents = match std::fs::read_to_string(&report_path) {
        Ok(contents) => contents,
        Err(e) => return (false, Some(format!("doctor_report_invalid:{e}"))),
    };
    let report: Value = match serde_json::from_str(&contents) {
        Ok(report) => report,
        Err(e) => return (false, Some(format!("doctor_report_invalid:{e}"))),
    };
    let status = report
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if status.eq_ignore_ascii_case("pass") {
        (true, None)
    } else {
        (false, Some("doctor_report_not_pass".to_string()))
    }
}

fn record_ledger(cfg: &AdaadConfig, payload: Map<String, Value>) -> Option<Value> {
    if !cfg.ledger_enabled || cfg.ledger_readonly {
        return None;
    }
    match append_event(cfg, "mutation_attempt", payload, &utc_now_iso_z(), "mutate_code") {
        Ok(event) => Some(json!({"event_id": event["event_id"], "hash": event["hash"]})),
        Err(e) => {
            tracing::warn!(error = %e, "mutation ledger append failed");
            Some(json!({"error": e.to_string()}))
        }
    }
}

/// Run the mutation pipeline on an already-gated source.
///
/// Parse, apply the `drop_pass` transform, re-parse the output for
/// round-trip safety, enforce the import allowlist on the mutated source,
/// execute in the sandbox, and evaluate promotion.
pub fn run_pipeline(cfg: &AdaadConfig, src: &str, timeout: f64) -> Outcome<MutationReport> {
    let module = ast::parse(src).map_err(|e| KernelCrash::integrity(e.to_string()))?;
    let (mutated, mutation_kind) = ast::drop_pass(&module);
    let mutated_src = ast::unparse(&mutated);
    let verified = ast::parse(&mutated_src)
        .map_err(|e| KernelCrash::integrity(format!("round trip failed: {e}")))?;

    let imported = ast::imports(&verified);
    let allowlist_ok = imported
        .iter()
        .all(|module| ALLOWED_IMPORTS.contains(&module.as_str()));
    if !allowlist_ok {
        return Ok(MutationReport {
            mutated_src,
            score: 0.0,
            ast_ok: true,
            sandbox_ok: false,
            timeout: false,
            allowlist_ok: false,
            skipped: false,
            reason: Some("import_not_allowed".to_string()),
            ledger_event: record_ledger(cfg, allowlist_failure_payload(cfg, &mutation_kind)),
            mutation_kind: mutation_kind.map(str::to_string),
            auto_promote: false,
            doctor_gate_ok: false,
            resource_caps: None,
        });
    }

    let sandbox = execute_in_sandbox(&mutated_src, timeout);
    let timed_out = sandbox.timeout
        || matches!(
            sandbox.error.as_deref(),
            Some("no_result") | Some("no_result_no_message")
        );
    let score = if sandbox.ok { 1.0 } else { 0.0 };

    let (doctor_gate_ok, doctor_reason) = doctor_gate(cfg);
    let can_promote = sandbox.ok
        && cfg.mutation_policy == MutationPolicy::Evolutionary
        && cfg.resource_tier == ResourceTier::Server;
    let auto_promote = can_promote && doctor_gate_ok;

    let reason = if can_promote && !doctor_gate_ok {
        Some("requires_doctor_gate".to_string())
    } else if sandbox.start_failed {
        Some("sandbox_start_failed".to_string())
    } else if timed_out {
        Some("timeout".to_string())
    } else if !sandbox.ok && sandbox.error.is_some() {
        Some("sandbox_error".to_string())
    } else {
        None
    };

    let mut payload = Map::new();
    payload.insert("policy".to_string(), json!(cfg.mutation_policy.as_str()));
    payload.insert("resource_tier".to_string(), json!(cfg.resource_tier.as_str()));
    payload.insert("ast_ok".to_string(), json!(true));
    payload.insert("allowlist_ok".to_string(), json!(true));
    payload.insert("sandbox_ok".to_string(), json!(sandbox.ok));
    payload.insert("timeout".to_string(), json!(timed_out));
    payload.insert("score".to_string(), json!(score));
    payload.insert("auto_promote".to_string(), json!(auto_promote));
    payload.insert("doctor_gate".to_string(), json!(doctor_gate_ok));
    payload.insert("doctor_reason".to_string(), json!(doctor_reason));
    payload.insert("mutation_kind".to_string(), json!(mutation_kind));
    payload.insert("resource_caps".to_string(), sandbox.resource_caps.clone().unwrap_or(Value::Null));
    payload.insert("sandbox_error".to_string(), json!(sandbox.error));
    payload.insert("exitcode".to_string(), json!(sandbox.exitcode));
    let ledger_event = record_ledger(cfg, payload);

    Ok(MutationReport {
        mutated_src,
        score,
        ast_ok: true,
        sandbox_ok: sandbox.ok,
        timeout: timed_out,
        allowlist_ok: true,
        skipped: false,
        reason,
        ledger_event,
        mutation_kind: mutation_kind.map(str::to_string),
        auto_promote,
        doctor_gate_ok,
        resource_caps: sandbox.resource_caps,
    })
}

fn allowlist_failure_payload(
    cfg: &AdaadConfig,
    mutation_kind: &Option<&'static str>,
) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("policy".to_string(), json!(cfg.mutation_policy.as_str()));
    payload.insert("resource_tier".to_string(), json!(cfg.resource_tier.as_str()));
    payload.insert("ast_ok".to_string(), json!(true));
    payload.insert("allowlist_ok".to_string(), json!(false));
    payload.insert("sandbox_ok".to_string(), json!(false));
    payload.insert("reason".to_string(), json!("import_not_allowed"));
    payload.insert("mutation_kind".to_string(), json!(mutation_kind));
    payload
}

/// Gate and run one mutation attempt end to end.
pub fn mutate_source(
    cfg: &AdaadConfig,
    src: &str,
    timeout: Option<f64>,
    evidence_store: Option<&EvidenceStore>,
    lineage_hash: Option<&str>,
) -> Outcome<MutationReport> {
    let src = coerce_source(src)?;
    let timeout = coerce_timeout(timeout, cfg)?;
    if let Some(reason) = skip_reason(cfg, evidence_store, lineage_hash) {
        return Ok(MutationReport::skipped(&src, &reason));
    }
    run_pipeline(cfg, &src, timeout)
}
