//! Write a text artifact under the workspace root.

use std::path::Path;

use adaad6_config::{resolve_under_home, AdaadConfig};
use adaad6_kernel::{KernelCrash, Outcome};
use serde_json::{json, Map, Value};

use crate::registry::Action;

pub struct WriteArtifact;

impl Action for WriteArtifact {
    fn validate(&self, params: &Map<String, Value>, cfg: &AdaadConfig) -> Outcome<Value> {
        let content = params
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let destination = params
            .get("destination")
            .and_then(Value::as_str)
            .unwrap_or("artifact.txt");
        let content_type = params
            .get("content_type")
            .and_then(Value::as_str)
            .unwrap_or("text/plain");

        let resolved = resolve_under_home(Path::new(&cfg.home), destination, "destination")
            .map_err(|e| KernelCrash::integrity(e.to_string()))?;

        Ok(json!({
            "content": content,
            "destination": resolved.display().to_string(),
            "content_type": content_type,
        }))
    }

    fn run(&self, validated: Value) -> Outcome<Value> {
        let destination = validated["destination"]
            .as_str()
            .ok_or_else(|| KernelCrash::integrity("destination must be a string"))?;
        let content = validated["content"].as_str().unwrap_or("");

        let path = Path::new(destination);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = content.as_bytes();
        std::fs::write(path, data)?;

        Ok(json!({
            "destination": destination,
            "bytes": data.len(),
            "content_type": validated["content_type"],
        }))
    }

    fn postcheck(&self, result: Value, _cfg: &AdaadConfig) -> Outcome<Value> {
        let destination = result
            .get("destination")
            .and_then(Value::as_str)
            .ok_or_else(|| KernelCrash::integrity("write_artifact result missing destination"))?;
        let path = Path::new(destination);
        if !path.is_file() {
            return Err(KernelCrash::integrity(
                "write_artifact result destination missing",
            ));
        }
        if let Some(expected) = result.get("bytes").and_then(Value::as_u64) {
            let actual = std::fs::metadata(path)?.len();
            if actual != expected {
                return Err(KernelCrash::integrity(
                    "write_artifact result byte count mismatch",
                ));
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_and_postchecks_an_artifact() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cfg = AdaadConfig {
            home: tmp.path().display().to_string(),
            ..AdaadConfig::default()
        };
        let mut params = Map::new();
        params.insert("content".to_string(), json!("hello"));
        params.insert("destination".to_string(), json!("out/report.txt"));

        let action = WriteArtifact;
        let validated = action.validate(&params, &cfg).expect("validate");
        let result = action.run(validated).expect("run");
        assert_eq!(result["bytes"], json!(5));
        let checked = action.postcheck(result, &cfg).expect("postcheck");
        assert!(tmp.path().join("out/report.txt").is_file());
        assert_eq!(checked["content_type"], json!("text/plain"));
    }

    #[test]
    fn destination_outside_home_is_rejected() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cfg = AdaadConfig {
            home: tmp.path().display().to_string(),
            ..AdaadConfig::default()
        };
        let mut params = Map::new();
        params.insert("destination".to_string(), json!("../escape.txt"));

        let err = WriteArtifact.validate(&params, &cfg).expect_err("escape");
        assert_eq!(err.code, adaad6_kernel::CrashCode::IntegrityViolation);
    }
}
