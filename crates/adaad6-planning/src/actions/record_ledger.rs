//! Append an operator-supplied event to the provenance ledger.
//!
//! Skips cleanly when the ledger is disabled or read-only; recording an
//! intent must never flip a run into failure on a frozen config.

use adaad6_config::AdaadConfig;
use adaad6_kernel::{KernelCrash, Outcome};
use adaad6_ledger::{append_event, utc_now_iso_z};
use serde_json::{json, Map, Value};

use crate::actions::{cfg_from_value, cfg_to_value};
use crate::registry::Action;

pub struct RecordLedger;

impl Action for RecordLedger {
    fn validate(&self, params: &Map<String, Value>, cfg: &AdaadConfig) -> Outcome<Value> {
        let event_type = params
            .get("event_type")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("operator_note");
        let payload = match params.get("payload") {
            None => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => return Err(KernelCrash::integrity("payload must be an object")),
        };
        let actor = params
            .get("actor")
            .and_then(Value::as_str)
            .unwrap_or("planner");
        Ok(json!({
            "event_type": event_type,
            "payload": payload,
            "actor": actor,
            "cfg": cfg_to_value(cfg)?,
        }))
    }

    fn run(&self, validated: Value) -> Outcome<Value> {
        let cfg = cfg_from_value(&validated)?;
        if !cfg.ledger_enabled {
            return Ok(json!({
                "skipped": true, "reason": "ledger_disabled", "event": null,
                "completed": true, "ok": true,
            }));
        }
        if cfg.ledger_readonly {
            return Ok(json!({
                "skipped": true, "reason": "ledger_readonly", "event": null,
                "completed": true, "ok": true,
            }));
        }

        let event_type = validated["event_type"].as_str().unwrap_or("operator_note");
        let actor = validated["actor"].as_str().unwrap_or("planner");
        let payload = validated["payload"].as_object().cloned().unwrap_or_default();
        let ts = utc_now_iso_z();
        let event = append_event(&cfg, event_type, payload, &ts, actor)
            .map_err(|e| KernelCrash::determinism(e.to_string()))?;

        Ok(json!({
            "skipped": false,
            "event": event,
            "timestamp": ts,
            "completed": true,
            "ok": true,
        }))
    }

    fn postcheck(&self, result: Value, cfg: &AdaadConfig) -> Outcome<Value> {
        if !result.is_object() {
            return Err(KernelCrash::integrity("record_ledger result must be an object"));
        }
        let skipped = result.get("skipped").and_then(Value::as_bool).unwrap_or(false);
        if cfg.ledger_enabled && !skipped && result.get("event").map(Value::is_null).unwrap_or(true)
        {
            return Err(KernelCrash::integrity(
                "record_ledger must include event when ledger is enabled",
            ));
        }
        if result.get("completed") != Some(&json!(true)) {
            return Err(KernelCrash::integrity("record_ledger must mark completion"));
        }
        if result.get("ok") != Some(&json!(true)) {
            return Err(KernelCrash::integrity(
                "record_ledger must set ok=true on success or skip",
            ));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adaad6_ledger::read_events;

    fn cfg_in(home: &std::path::Path, enabled: bool) -> AdaadConfig {
        AdaadConfig {
            home: home.display().to_string(),
            ledger_enabled: enabled,
            ..AdaadConfig::default()
        }
    }

    #[test]
    fn records_an_event_when_ledger_is_writable() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cfg = cfg_in(tmp.path(), true);
        let action = RecordLedger;

        let mut params = Map::new();
        params.insert("event_type".to_string(), json!("milestone"));
        params.insert("payload".to_string(), json!({"note": "first"}));

        let validated = action.validate(&params, &cfg).expect("validate");
        let result = action.run(validated).expect("run");
        let checked = action.postcheck(result, &cfg).expect("postcheck");
        assert_eq!(checked["skipped"], json!(false));

        let events = read_events(&cfg, None).expect("read");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["type"], json!("milestone"));
        assert_eq!(events[0]["payload"]["note"], json!("first"));
    }

    #[test]
    fn skips_on_disabled_and_readonly_ledgers() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let action = RecordLedger;

        let disabled = cfg_in(tmp.path(), false);
        let validated = action.validate(&Map::new(), &disabled).expect("validate");
        let result = action.run(validated).expect("run");
        assert_eq!(result["reason"], json!("ledger_disabled"));
        action.postcheck(result, &disabled).expect("postcheck");

        let readonly = AdaadConfig {
            ledger_readonly: true,
            ..cfg_in(tmp.path(), true)
        };
        let validated = action.validate(&Map::new(), &readonly).expect("validate");
        let result = action.run(validated).expect("run");
        assert_eq!(result["reason"], json!("ledger_readonly"));
        action.postcheck(result, &readonly).expect("postcheck");
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let cfg = AdaadConfig::default();
        let mut params = Map::new();
        params.insert("payload".to_string(), json!([1, 2, 3]));
        assert!(RecordLedger.validate(&params, &cfg).is_err());
    }
}
