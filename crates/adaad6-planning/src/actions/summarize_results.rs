//! Fold a list of results into a markdown summary.

use adaad6_config::AdaadConfig;
use adaad6_kernel::{KernelCrash, Outcome};
use serde_json::{json, Map, Value};

use crate::registry::Action;

pub struct SummarizeResults;

impl Action for SummarizeResults {
    fn validate(&self, params: &Map<String, Value>, _cfg: &AdaadConfig) -> Outcome<Value> {
        let title = params
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("Summary");
        let results = match params.get("results") {
            None => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(_) => return Err(KernelCrash::integrity("results must be a list")),
        };
        Ok(json!({"title": title, "results": results}))
    }

    fn run(&self, validated: Value) -> Outcome<Value> {
        let title = validated["title"].as_str().unwrap_or("Summary");
        let results = validated["results"].as_array().cloned().unwrap_or_default();

        let mut lines = vec![format!("# {title}")];
        for item in &results {
            let rendered = match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            lines.push(format!("- {rendered}"));
        }
        Ok(json!({"title": title, "summary": lines.join("\n")}))
    }

    fn postcheck(&self, result: Value, _cfg: &AdaadConfig) -> Outcome<Value> {
        if !result.is_object() {
            return Err(KernelCrash::integrity("summarize_results result must be an object"));
        }
        if result.get("summary").is_none() {
            return Err(KernelCrash::integrity("summarize_results result missing summary"));
        }
        Ok(result)
    }
}
