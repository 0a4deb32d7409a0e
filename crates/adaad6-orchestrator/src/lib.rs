//! ADAAD-6 Orchestrator - boot → gate → plan → execute
//!
//! The orchestrator wires the trust spine together: readiness enforcement
//! first, the boot probe second, then planning, the cryovant lineage gate
//! for mutation-class plans, and finally the recording executor. Every
//! terminal outcome is a structured [`OrchestratorResult`]; failures are
//! drawn from the fixed [`OrchestrationFailure`] set.

pub mod archetype;

pub use archetype::{ArchetypePolicy, ArchetypeRegistry};

use std::sync::Arc;

use adaad6_config::{enforce_readiness_gate, AdaadConfig};
use adaad6_evidence::{cryovant_lineage_gate, EvidenceStore, LineageGateResult};
use adaad6_kernel::{ContextError, KernelContext};
use adaad6_ledger::LedgerError;
use adaad6_mutation::MutateCode;
use adaad6_planning::{
    builtin_catalog, is_mutation_step, make_plan, ActionCatalog, Plan, PlanError, RegistryError,
};
use adaad6_runtime::{
    boot_sequence, execute_and_record, BootReport, ExecuteOptions, ExecutionLog, ExecutorError,
    OrchestrationFailure,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("unknown archetype: {name}")]
    UnknownArchetype { name: String },

    #[error("archetype name must be set")]
    ArchetypeNameMissing,

    #[error("archetype '{name}' already registered")]
    DuplicateArchetype { name: String },

    #[error("{name} archetype requires ledger_enabled=true")]
    ArchetypeRequiresLedger { name: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Terminal outcome of one orchestrated run.
#[derive(Debug)]
pub struct OrchestratorResult {
    pub ok: bool,
    pub config: AdaadConfig,
    pub plan: Option<Plan>,
    pub execution: Option<ExecutionLog>,
    pub boot: BootReport,
    pub lineage_gate: Option<LineageGateResult>,
    pub failure_reason: Option<OrchestrationFailure>,
}

impl OrchestratorResult {
    fn failed(
        config: AdaadConfig,
        boot: BootReport,
        plan: Option<Plan>,
        lineage_gate: Option<LineageGateResult>,
        reason: OrchestrationFailure,
    ) -> Self {
        Self {
            ok: false,
            config,
            plan,
            execution: None,
            boot,
            lineage_gate,
            failure_reason: Some(reason),
        }
    }
}

/// External inputs for one run.
#[derive(Default)]
pub struct RunInputs<'a> {
    pub evidence_store: Option<&'a EvidenceStore>,
    pub lineage_hash: Option<&'a str>,
    pub context: Option<KernelContext>,
}

type PlanFactory = dyn Fn(&str, &AdaadConfig) -> std::result::Result<Plan, PlanError> + Send + Sync;
type ActionBuilder =
    dyn Fn(&AdaadConfig, Option<&EvidenceStore>) -> std::result::Result<ActionCatalog, RegistryError>
        + Send
        + Sync;

/// Built-in actions plus the mutation engine wired to the run's evidence
/// store.
pub fn default_action_catalog(
    _cfg: &AdaadConfig,
    evidence_store: Option<&EvidenceStore>,
) -> std::result::Result<ActionCatalog, RegistryError> {
    let mut catalog = builtin_catalog()?;
    catalog.register(
        "mutate_code",
        Arc::new(MutateCode::new(evidence_store.cloned())),
    )?;
    Ok(catalog)
}

pub struct MetaOrchestrator {
    archetype: Option<String>,
    archetypes: ArchetypeRegistry,
    plan_factory: Option<Box<PlanFactory>>,
    action_builder: Option<Box<ActionBuilder>>,
}

impl Default for MetaOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaOrchestrator {
    pub fn new() -> Self {
        Self {
            archetype: None,
            archetypes: ArchetypeRegistry::with_builtins(),
            plan_factory: None,
            action_builder: None,
        }
    }

    pub fn with_archetype(archetype: &str) -> Self {
        Self {
            archetype: Some(archetype.trim().to_ascii_lowercase()),
            ..Self::new()
        }
    }

    /// Override the planner, e.g. for replaying a stored plan.
    pub fn with_plan_factory(
        mut self,
        factory: impl Fn(&str, &AdaadConfig) -> std::result::Result<Plan, PlanError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.plan_factory = Some(Box::new(factory));
        self
    }

    /// Override the action catalog builder.
    pub fn with_action_builder(
        mut self,
        builder: impl Fn(
                &AdaadConfig,
                Option<&EvidenceStore>,
            ) -> std::result::Result<ActionCatalog, RegistryError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.action_builder = Some(Box::new(builder));
        self
    }

    /// Register an operator-defined archetype policy.
    pub fn register_archetype(&mut self, policy: ArchetypePolicy) -> Result<()> {
        self.archetypes.register(policy)
    }

    /// Run one goal end to end.
    pub fn run(
        &self,
        goal: &str,
        cfg: &AdaadConfig,
        inputs: RunInputs<'_>,
    ) -> Result<OrchestratorResult> {
        let (enforced, readiness_demoted) = enforce_readiness_gate(cfg);
        let boot = boot_sequence(&enforced);

        if enforced.emergency_halt {
            return Ok(OrchestratorResult::failed(
                enforced,
                boot,
                None,
                None,
                OrchestrationFailure::EmergencyHalt,
            ));
        }
        if !enforced.agents_enabled {
            return Ok(OrchestratorResult::failed(
                enforced,
                boot,
                None,
                None,
                OrchestrationFailure::AgentsDisabled,
            ));
        }
        if boot.frozen || !boot.ok {
            return Ok(OrchestratorResult::failed(
                enforced,
                boot,
                None,
                None,
                OrchestrationFailure::BootFailed,
            ));
        }

        let mut actions = match &self.action_builder {
            Some(builder) => builder(&enforced, inputs.evidence_store)?,
            None => default_action_catalog(&enforced, inputs.evidence_store)?,
        };

        let policy = match &self.archetype {
            Some(name) => {
                let policy = self.archetypes.get(name).ok_or_else(|| {
                    OrchestratorError::UnknownArchetype { name: name.clone() }
                })?;
                if policy.require_ledger && !enforced.ledger_enabled {
                    return Err(OrchestratorError::ArchetypeRequiresLedger {
                        name: policy.name.clone(),
                    });
                }
                actions = policy.filter_actions(actions, &enforced);
                Some(policy)
            }
            None => None,
        };

        let plan = match &self.plan_factory {
            Some(factory) => factory(goal, &enforced),
            None => make_plan(goal, &enforced),
        };
        let plan = match plan {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!(error = %e, "planning failed");
                return Ok(OrchestratorResult::failed(
                    enforced,
                    boot,
                    None,
                    None,
                    OrchestrationFailure::PlanInvalid,
                ));
            }
        };

        let mutation_present = plan.steps.iter().any(is_mutation_step);
        let mut gate_result = None;
        if mutation_present {
            let expected = inputs
                .lineage_hash
                .filter(|h| !h.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| enforced.readiness_gate_sig.clone());
            let gate = cryovant_lineage_gate(inputs.evidence_store, Some(&expected));

            if readiness_demoted {
                return Ok(OrchestratorResult::failed(
                    enforced,
                    boot,
                    Some(plan),
                    Some(gate),
                    OrchestrationFailure::ReadinessFreeze,
                ));
            }
            if !enforced.mutation_enabled() {
                return Ok(OrchestratorResult::failed(
                    enforced,
                    boot,
                    Some(plan),
                    Some(gate),
                    OrchestrationFailure::MutationPolicyBlocked,
                ));
            }
            if !gate.ok {
                return Ok(OrchestratorResult::failed(
                    enforced,
                    boot,
                    Some(plan),
                    Some(gate),
                    OrchestrationFailure::LineageGateRejected,
                ));
            }
            gate_result = Some(gate);
        }

        let context = match inputs.context {
            Some(context) => context,
            None => KernelContext::build(&enforced)?,
        };

        if let Some(policy) = policy {
            policy.on_start(&enforced, goal, &plan)?;
        }

        let opts = ExecuteOptions {
            evidence_store: inputs.evidence_store,
            lineage_hash: inputs.lineage_hash,
            gate_result: gate_result.as_ref(),
            capture_debug: false,
        };
        let execution = execute_and_record(
            &plan.steps,
            &actions,
            &enforced,
            Some(context),
            "executor",
            policy.map(|p| p.require_ledger).unwrap_or(false),
            &opts,
        )?;

        if let Some(policy) = policy {
            policy.on_complete(&enforced, goal, Some(&execution))?;
        }

        let ok = execution.ok;
        Ok(OrchestratorResult {
            ok,
            config: enforced,
            plan: Some(plan),
            execution: Some(execution),
            boot,
            lineage_gate: gate_result,
            failure_reason: if ok {
                None
            } else {
                Some(OrchestrationFailure::ExecutionFailed)
            },
        })
    }
}
