//! Boot sequence
//!
//! The health probe the orchestrator runs before planning anything:
//! structure, config, and ledger readiness, plus the effective limits.

use adaad6_config::AdaadConfig;
use adaad6_ledger::ensure_ledger;
use serde_json::{json, Map, Value};

use crate::health::check_structure;

#[derive(Debug, Clone)]
pub struct BootReport {
    pub ok: bool,
    pub frozen: bool,
    pub checks: Map<String, Value>,
    pub ledger: Value,
    pub limits: Value,
    pub build: Value,
}

impl BootReport {
    pub fn to_value(&self) -> Value {
        json!({
            "ok": self.ok,
            "frozen": self.frozen,
            "checks": self.checks,
            "ledger": self.ledger,
            "limits": self.limits,
            "build": self.build,
        })
    }
}

/// Probe the workspace and report whether a run may proceed.
pub fn boot_sequence(cfg: &AdaadConfig) -> BootReport {
    let config_ok = cfg.validate().is_ok();
    let structure_ok = check_structure(cfg);

    let mut ledger_ok = true;
    let mut ledger_path = None;
    let mut ledger_error = None;
    if cfg.ledger_enabled {
        match ensure_ledger(cfg) {
            Ok(path) => ledger_path = Some(path.display().to_string()),
            Err(e) => {
                ledger_ok = false;
                ledger_error = Some(e.to_string());
            }
        }
    }

    let mut checks = Map::new();
    checks.insert("structure".to_string(), json!(structure_ok));
    checks.insert("config".to_string(), json!(config_ok));
    checks.insert("ledger".to_string(), json!(ledger_ok));

    BootReport {
        ok: structure_ok && config_ok && (ledger_ok || !cfg.ledger_enabled),
        frozen: cfg.emergency_halt,
        checks,
        ledger: json!({
            "enabled": cfg.ledger_enabled,
            "readonly": cfg.ledger_readonly,
            "ok": ledger_ok,
            "path": ledger_path,
            "error": ledger_error,
        }),
        limits: json!({
            "planner_max_steps": cfg.planner_max_steps,
            "planner_max_seconds": cfg.planner_max_seconds,
        }),
        build: json!({
            "version": cfg.version,
            "mutation_policy": cfg.mutation_policy.as_str(),
            "resource_tier": cfg.resource_tier.as_str(),
        }),
    }
}
