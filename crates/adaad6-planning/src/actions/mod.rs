//! Built-in action modules
//!
//! Registered into the catalog in deterministic order before any
//! user-provided actions. Each module is a thin three-stage triple; the
//! heavier mutation action lives in its own crate and is added by the
//! orchestrator's catalog builder.

use std::sync::Arc;

use adaad6_config::AdaadConfig;
use adaad6_kernel::{KernelCrash, Outcome};
use serde_json::Value;

use crate::registry::{ActionCatalog, RegistryError};

pub mod doctor_gate;
pub mod record_ledger;
pub mod summarize_results;
pub mod write_artifact;

pub const BUILTIN_ACTION_NAMES: [&str; 5] = [
    "doctor_gate",
    "record_ledger",
    "run_tests",
    "summarize_results",
    "write_artifact",
];

/// Catalog seeded with every built-in action.
pub fn builtin_catalog() -> Result<ActionCatalog, RegistryError> {
    let mut catalog = ActionCatalog::new();
    catalog.register("doctor_gate", Arc::new(doctor_gate::DoctorGate))?;
    catalog.register("record_ledger", Arc::new(record_ledger::RecordLedger))?;
    catalog.register("run_tests", Arc::new(run_tests::RunTests))?;
    catalog.register("summarize_results", Arc::new(summarize_results::SummarizeResults))?;
    catalog.register("write_artifact", Arc::new(write_artifact::WriteArtifact))?;
    Ok(catalog)
}

/// Embed the config into a validated payload so `run` can use it.
pub(crate) fn cfg_to_value(cfg: &AdaadConfig) -> Outcome<Value> {
    serde_json::to_value(cfg).map_err(KernelCrash::from)
}

pub(crate) fn cfg_from_value(validated: &Value) -> Outcome<AdaadConfig> {
    let raw = validated
        .get("cfg")
        .ok_or_else(|| KernelCrash::evidence("validated payload missing cfg"))?;
    serde_json::from_value(raw.clone()).map_err(KernelCrash::from)
}
