//! Orchestration failure reasons
//!
//! These terminate a run cleanly and surface in
//! `OrchestratorResult.failure_reason`; no implicit retry is performed.
//! They are distinct from kernel crashes, which classify step failures.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrchestrationFailure {
    BootFailed,
    EmergencyHalt,
    AgentsDisabled,
    ReadinessFreeze,
    MutationPolicyBlocked,
    LineageGateRejected,
    PlanInvalid,
    ExecutionFailed,
}

impl OrchestrationFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestrationFailure::BootFailed => "BOOT_FAILED",
            OrchestrationFailure::EmergencyHalt => "EMERGENCY_HALT",
            OrchestrationFailure::AgentsDisabled => "AGENTS_DISABLED",
            OrchestrationFailure::ReadinessFreeze => "READINESS_FREEZE",
            OrchestrationFailure::MutationPolicyBlocked => "MUTATION_POLICY_BLOCKED",
            OrchestrationFailure::LineageGateRejected => "LINEAGE_GATE_REJECTED",
            OrchestrationFailure::PlanInvalid => "PLAN_INVALID",
            OrchestrationFailure::ExecutionFailed => "EXECUTION_FAILED",
        }
    }
}
