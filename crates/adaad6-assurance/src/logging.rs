//! Checksummed JSONL operational log
//!
//! Lightweight sibling of the provenance ledger: no hash chain, but every
//! event carries a checksum over its own body so single-event tampering is
//! still detectable.

use std::io::Write;
use std::path::{Path, PathBuf};

use adaad6_config::{resolve_under_home, AdaadConfig};
use adaad6_crypto::canon::canonical_json;
use adaad6_crypto::hash::hash_object;
use adaad6_ledger::utc_now_iso_z;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::{AssuranceError, Result};

/// Checksum over a payload's canonical form.
pub fn compute_checksum(payload: &Value) -> String {
    hash_object(payload)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub schema_version: String,
    pub ts: String,
    pub actor: String,
    pub intent: String,
    pub inputs: Map<String, Value>,
    pub outputs: Map<String, Value>,
    pub checksum: String,
}

/// Build a log event with its checksum computed over everything else.
pub fn build_log_event(
    schema_version: &str,
    ts: &str,
    actor: &str,
    intent: &str,
    inputs: Map<String, Value>,
    outputs: Map<String, Value>,
) -> LogEvent {
    let payload = json!({
        "schema_version": schema_version,
        "ts": ts,
        "actor": actor,
        "intent": intent,
        "inputs": inputs,
        "outputs": outputs,
    });
    LogEvent {
        schema_version: schema_version.to_string(),
        ts: ts.to_string(),
        actor: actor.to_string(),
        intent: intent.to_string(),
        inputs,
        outputs,
        checksum: compute_checksum(&payload),
    }
}

/// Resolve the operational log path under the sandbox root.
pub fn log_path(cfg: &AdaadConfig) -> Result<PathBuf> {
    Ok(resolve_under_home(
        Path::new(&cfg.home),
        &cfg.log_path,
        "log_path",
    )?)
}

/// Append a checksummed event to the operational log and return it.
pub fn append_jsonl_log_event(
    cfg: &AdaadConfig,
    action: &str,
    outcome: &str,
    details: Map<String, Value>,
    ts: Option<&str>,
) -> Result<Value> {
    let event_without_checksum = json!({
        "schema_version": cfg.log_schema_version,
        "ts": ts.map(str::to_string).unwrap_or_else(utc_now_iso_z),
        "action": action,
        "outcome": outcome,
        "details": details,
    });
    let mut event = event_without_checksum.clone();
    event["checksum"] = Value::String(compute_checksum(&event_without_checksum));

    let target = log_path(cfg)?;
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if target.is_dir() {
        return Err(AssuranceError::PathIsDirectory {
            path: target.display().to_string(),
        });
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&target)?;
    let mut line = canonical_json(&event);
    line.push('\n');
    file.write_all(line.as_bytes())?;
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg_in(home: &Path) -> AdaadConfig {
        AdaadConfig {
            home: home.display().to_string(),
            ..AdaadConfig::default()
        }
    }

    fn body_without_checksum(event: &Value) -> Value {
        let mut body = event.clone();
        if let Value::Object(map) = &mut body {
            map.remove("checksum");
        }
        body
    }

    #[test]
    fn log_event_checksum_covers_the_body() {
        let event = build_log_event("1", "2026-01-01T00:00:00Z", "cli", "boot", Map::new(), Map::new());
        let serialized = serde_json::to_value(&event).expect("serialize");
        assert_eq!(event.checksum, compute_checksum(&body_without_checksum(&serialized)));
    }

    #[test]
    fn appended_events_are_canonical_lines() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cfg = cfg_in(tmp.path());
        let mut details = Map::new();
        details.insert("result".to_string(), serde_json::json!({"ok": true}));

        let event =
            append_jsonl_log_event(&cfg, "boot", "ok", details, Some("2026-01-01T00:00:00Z"))
                .expect("append");

        let contents = std::fs::read_to_string(log_path(&cfg).expect("path")).expect("read");
        let line = contents.lines().next().expect("one line");
        assert_eq!(line, canonical_json(&event));
        let reparsed: Value = serde_json::from_str(line).expect("parse");
        assert_eq!(
            reparsed["checksum"].as_str().expect("checksum"),
            compute_checksum(&body_without_checksum(&reparsed))
        );
    }

    #[test]
    fn log_path_is_sandboxed() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cfg = AdaadConfig {
            home: tmp.path().display().to_string(),
            log_path: "../outside.jsonl".to_string(),
            ..AdaadConfig::default()
        };
        assert!(append_jsonl_log_event(&cfg, "boot", "ok", Map::new(), None).is_err());
    }
}
