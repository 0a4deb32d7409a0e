//! Gate a plan on the doctor's combined diagnostics.

use adaad6_assurance::run_doctor;
use adaad6_config::AdaadConfig;
use adaad6_kernel::{KernelCrash, Outcome};
use serde_json::{json, Map, Value};

use crate::actions::{cfg_from_value, cfg_to_value};
use crate::registry::Action;

pub struct DoctorGate;

impl Action for DoctorGate {
    fn validate(&self, params: &Map<String, Value>, cfg: &AdaadConfig) -> Outcome<Value> {
        let require_pass = match params.get("require_pass") {
            None => true,
            Some(Value::Bool(flag)) => *flag,
            Some(_) => return Err(KernelCrash::integrity("require_pass must be a boolean")),
        };
        Ok(json!({"require_pass": require_pass, "cfg": cfg_to_value(cfg)?}))
    }

    fn run(&self, validated: Value) -> Outcome<Value> {
        let cfg = cfg_from_value(&validated)?;
        let require_pass = validated["require_pass"].as_bool().unwrap_or(true);

        let report = run_doctor(&cfg);
        let doctor_ok = report.ok;
        let passed = doctor_ok || !require_pass;
        Ok(json!({
            "ok": passed,
            "doctor_ok": doctor_ok,
            "report": report.to_value(),
            "reason": if passed { Value::Null } else { json!("doctor_failed") },
        }))
    }

    fn postcheck(&self, result: Value, _cfg: &AdaadConfig) -> Outcome<Value> {
        if !result.is_object() {
            return Err(KernelCrash::integrity("doctor_gate result must be an object"));
        }
        let report = result
            .get("report")
            .ok_or_else(|| KernelCrash::integrity("doctor_gate result missing report"))?;
        if !report.is_object() {
            return Err(KernelCrash::integrity("doctor_gate report must be an object"));
        }
        let ok = result.get("ok").and_then(Value::as_bool).unwrap_or(false);
        if !ok && result.get("reason").map(Value::is_null).unwrap_or(true) {
            return Err(KernelCrash::integrity("doctor_gate failure must include reason"));
        }
        Ok(result)
    }
}
