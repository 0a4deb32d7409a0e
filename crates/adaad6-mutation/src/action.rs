//! The `mutate_code` action

use adaad6_config::AdaadConfig;
use adaad6_evidence::EvidenceStore;
use adaad6_kernel::{KernelCrash, Outcome};
use adaad6_planning::Action;
use serde_json::{json, Map, Value};

use crate::{coerce_source, coerce_timeout, run_pipeline, skip_reason, MutationReport};

/// Action wrapper around the mutation engine. Holds the evidence store the
/// catalog builder wired in; the lineage gate runs during precheck so a
/// blocked attempt skips before the sandbox ever starts.
pub struct MutateCode {
    evidence_store: Option<EvidenceStore>,
}

impl MutateCode {
    pub fn new(evidence_store: Option<EvidenceStore>) -> Self {
        Self { evidence_store }
    }
}

impl Action for MutateCode {
    fn validate(&self, params: &Map<String, Value>, cfg: &AdaadConfig) -> Outcome<Value> {
        let raw_src = params
            .get("src")
            .and_then(Value::as_str)
            .ok_or_else(|| KernelCrash::integrity("src must be a string"))?;
        let src = coerce_source(raw_src)?;

        let timeout = match params.get("timeout") {
            None | Some(Value::Null) => coerce_timeout(None, cfg)?,
            Some(raw) => {
                let raw = raw
                    .as_f64()
                    .ok_or_else(|| KernelCrash::integrity("timeout must be numeric"))?;
                coerce_timeout(Some(raw), cfg)?
            }
        };

        let lineage_hash = params
            .get("lineage_hash")
            .and_then(Value::as_str)
            .filter(|h| !h.trim().is_empty())
            .map(str::to_string);

        let skip = skip_reason(cfg, self.evidence_store.as_ref(), lineage_hash.as_deref());

        Ok(json!({
            "src": src,
            "timeout": timeout,
            "skip_reason": skip,
            "lineage_hash": lineage_hash,
            "cfg": serde_json::to_value(cfg).map_err(KernelCrash::from)?,
        }))
    }

    fn run(&self, validated: Value) -> Outcome<Value> {
        let src = validated["src"]
            .as_str()
            .ok_or_else(|| KernelCrash::evidence("validated payload missing src"))?;

        if let Some(reason) = validated["skip_reason"].as_str() {
            return Ok(MutationReport::skipped(src, reason).to_value());
        }

        let cfg: AdaadConfig = serde_json::from_value(validated["cfg"].clone())
            .map_err(KernelCrash::from)?;
        let timeout = validated["timeout"].as_f64().unwrap_or(1.0);
        let report = run_pipeline(&cfg, src, timeout)?;
        Ok(report.to_value())
    }

    fn postcheck(&self, result: Value, cfg: &AdaadConfig) -> Outcome<Value> {
        if !result.is_object() {
            return Err(KernelCrash::integrity("mutate_code result must be an object"));
        }
        for field in ["mutated_src", "score", "ast_ok", "sandbox_ok", "timeout", "allowlist_ok", "skipped"] {
            if result.get(field).is_none() {
                return Err(KernelCrash::integrity(format!(
                    "mutate_code result missing field: {field}"
                )));
            }
        }
        let skipped = result["skipped"].as_bool().unwrap_or(false);
        if cfg.resource_tier == adaad6_config::ResourceTier::Mobile && !skipped {
            return Err(KernelCrash::integrity("mobile tier must skip mutation"));
        }
        if cfg.mutation_policy == adaad6_config::MutationPolicy::Locked && !skipped {
            return Err(KernelCrash::integrity("locked mutation policy must skip mutation"));
        }
        Ok(result)
    }
}
