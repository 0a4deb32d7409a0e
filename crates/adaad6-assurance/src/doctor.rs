//! Doctor diagnostics
//!
//! Combined config / structure / ledger probes. The report's `status`
//! field is the promotion gate other components consume: mutation
//! auto-promotion requires a persisted report with `status == "PASS"` at
//! `home/.adaad/doctor/latest.json`.

use std::path::{Path, PathBuf};

use adaad6_config::{resolve_under_home, AdaadConfig};
use adaad6_ledger::{append_event, ensure_ledger, utc_now_iso_z};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::Result;

/// Where the persisted doctor verdict lives, relative to `home`.
pub const DOCTOR_REPORT_RELATIVE_PATH: &str = ".adaad/doctor/latest.json";

#[derive(Debug, Clone)]
pub struct DoctorReport {
    pub ok: bool,
    pub run_id: String,
    pub checks: Map<String, Value>,
    pub ledger_event: Value,
    pub schema_version: String,
}

impl DoctorReport {
    pub fn status(&self) -> &'static str {
        if self.ok {
            "PASS"
        } else {
            "FAIL"
        }
    }

    pub fn to_value(&self) -> Value {
        let mut summary = Map::new();
        for (name, check) in &self.checks {
            summary.insert(
                name.clone(),
                json!({
                    "ok": check.get("ok").and_then(Value::as_bool).unwrap_or(false),
                    "skipped": check.get("skipped").and_then(Value::as_bool).unwrap_or(false),
                }),
            );
        }
        json!({
            "schema_version": self.schema_version,
            "ok": self.ok,
            "status": self.status(),
            "run_id": self.run_id,
            "checks": self.checks,
            "checks_summary": summary,
            "ledger_event": self.ledger_event,
        })
    }
}

fn check_config(cfg: &AdaadConfig) -> Value {
    match cfg.validate() {
        Ok(()) => json!({"ok": true, "schema_version": cfg.config_schema_version}),
        Err(e) => json!({"ok": false, "error": e.to_string()}),
    }
}

fn check_structure(cfg: &AdaadConfig) -> Value {
    let home = Path::new(&cfg.home);
    let home_ok = home.is_dir();
    let actions_ok = resolve_under_home(home, &cfg.actions_dir, "actions_dir").is_ok();
    let log_ok = resolve_under_home(home, &cfg.log_path, "log_path").is_ok();
    json!({
        "ok": home_ok && actions_ok && log_ok,
        "home": home_ok,
        "actions_dir": actions_ok,
        "log_path": log_ok,
    })
}

fn check_ledger(cfg: &AdaadConfig) -> Value {
    if !cfg.ledger_enabled {
        return json!({"ok": true, "skipped": true});
    }
    match ensure_ledger(cfg) {
        Ok(path) => json!({"ok": true, "path": path.display().to_string()}),
        Err(e) => json!({"ok": false, "error": e.to_string()}),
    }
}

/// Run the combined diagnostics and, when the ledger is writable, append a
/// `doctor` event recording the verdict.
pub fn run_doctor(cfg: &AdaadConfig) -> DoctorReport {
    let run_id = Uuid::new_v4().simple().to_string();

    let mut checks = Map::new();
    checks.insert("config".to_string(), check_config(cfg));
    checks.insert("ledger".to_string(), check_ledger(cfg));
    checks.insert("structure".to_string(), check_structure(cfg));

    let mut ok = checks
        .values()
        .all(|check| check.get("ok").and_then(Value::as_bool).unwrap_or(false));

    let ledger_check_ok = checks["ledger"]["ok"].as_bool().unwrap_or(false);
    let mut ledger_event = json!({"appended": false, "error": null, "event": null});
    if cfg.ledger_enabled && !cfg.ledger_readonly && ledger_check_ok {
        let mut payload = Map::new();
        payload.insert("action".to_string(), json!("doctor"));
        payload.insert("schema_version".to_string(), json!(cfg.log_schema_version));
        payload.insert("overall_ok".to_string(), json!(ok));
        payload.insert("run_id".to_string(), json!(run_id));
        payload.insert("resource_tier".to_string(), json!(cfg.resource_tier.as_str()));
        match append_event(cfg, "doctor", payload, &utc_now_iso_z(), "doctor") {
            Ok(event) => {
                ledger_event = json!({
                    "appended": true,
                    "error": null,
                    "event": {"event_id": event["event_id"], "hash": event["hash"]},
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "doctor ledger append failed");
                ledger_event = json!({"appended": false, "error": e.to_string(), "event": null});
                ok = false;
            }
        }
    }

    DoctorReport {
        ok,
        run_id,
        checks,
        ledger_event,
        schema_version: cfg.log_schema_version.clone(),
    }
}

/// Persist the report verdict to `home/.adaad/doctor/latest.json`.
pub fn write_latest_report(cfg: &AdaadConfig, report: &DoctorReport) -> Result<PathBuf> {
    let target = resolve_under_home(
        Path::new(&cfg.home),
        DOCTOR_REPORT_RELATIVE_PATH,
        "doctor_report",
    )?;
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let serialized = serde_json::to_string_pretty(&report.to_value())?;
    std::fs::write(&target, serialized)?;
    Ok(target)
}
