//! Archetype policies
//!
//! A named bundle the orchestrator is parameterized by: a pure action-set
//! filter, a ledger requirement, and optional lifecycle hooks whose ledger
//! payloads embed a `payload_hash` for content binding.

use std::collections::BTreeMap;

use adaad6_config::AdaadConfig;
use adaad6_crypto::hash::hash_object;
use adaad6_ledger::{append_event, utc_now_iso_z, LedgerError};
use adaad6_planning::{ActionCatalog, ActionSpec, Plan, BUILTIN_ACTION_NAMES};
use adaad6_runtime::ExecutionLog;
use serde_json::{json, Map, Value};

use crate::{OrchestratorError, Result};

type ActionFilter = dyn Fn(ActionCatalog, &AdaadConfig) -> ActionCatalog + Send + Sync;
type StartHook =
    dyn Fn(&AdaadConfig, &str, &Plan) -> std::result::Result<(), LedgerError> + Send + Sync;
type CompleteHook = dyn Fn(&AdaadConfig, &str, Option<&ExecutionLog>) -> std::result::Result<(), LedgerError>
    + Send
    + Sync;

pub struct ArchetypePolicy {
    pub name: String,
    pub require_ledger: bool,
    filter: Box<ActionFilter>,
    on_start: Option<Box<StartHook>>,
    on_complete: Option<Box<CompleteHook>>,
}

impl ArchetypePolicy {
    /// Build a policy from a pure action filter.
    pub fn new(
        name: &str,
        filter: impl Fn(ActionCatalog, &AdaadConfig) -> ActionCatalog + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.trim().to_ascii_lowercase(),
            require_ledger: false,
            filter: Box::new(filter),
            on_start: None,
            on_complete: None,
        }
    }

    pub fn require_ledger(mut self) -> Self {
        self.require_ledger = true;
        self
    }

    pub fn with_on_start(
        mut self,
        hook: impl Fn(&AdaadConfig, &str, &Plan) -> std::result::Result<(), LedgerError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.on_start = Some(Box::new(hook));
        self
    }

    pub fn with_on_complete(
        mut self,
        hook: impl Fn(&AdaadConfig, &str, Option<&ExecutionLog>) -> std::result::Result<(), LedgerError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.on_complete = Some(Box::new(hook));
        self
    }

    pub fn filter_actions(&self, actions: ActionCatalog, cfg: &AdaadConfig) -> ActionCatalog {
        (self.filter)(actions, cfg)
    }

    pub fn on_start(&self, cfg: &AdaadConfig, goal: &str, plan: &Plan) -> Result<()> {
        if let Some(hook) = &self.on_start {
            hook(cfg, goal, plan).map_err(OrchestratorError::Ledger)?;
        }
        Ok(())
    }

    pub fn on_complete(
        &self,
        cfg: &AdaadConfig,
        goal: &str,
        log: Option<&ExecutionLog>,
    ) -> Result<()> {
        if let Some(hook) = &self.on_complete {
            hook(cfg, goal, log).map_err(OrchestratorError::Ledger)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ArchetypePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchetypePolicy")
            .field("name", &self.name)
            .field("require_ledger", &self.require_ledger)
            .finish()
    }
}

/// Name-keyed registry owned by the orchestrator; no process-global state.
#[derive(Debug, Default)]
pub struct ArchetypeRegistry {
    policies: BTreeMap<String, ArchetypePolicy>,
}

impl ArchetypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the built-in archetypes.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register(monetizer_archetype())
            .unwrap_or_else(|_| unreachable!("builtin archetypes have unique names"));
        registry
    }

    pub fn register(&mut self, policy: ArchetypePolicy) -> Result<()> {
        let key = policy.name.clone();
        if key.is_empty() {
            return Err(OrchestratorError::ArchetypeNameMissing);
        }
        if self.policies.contains_key(&key) {
            return Err(OrchestratorError::DuplicateArchetype { name: key });
        }
        self.policies.insert(key, policy);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ArchetypePolicy> {
        self.policies.get(&name.trim().to_ascii_lowercase())
    }
}

/// Attach a `payload_hash` over the payload's canonical form.
fn hashed_lifecycle_payload(payload: Map<String, Value>) -> Map<String, Value> {
    let digest = hash_object(&Value::Object(payload.clone()));
    let mut hashed = payload;
    hashed.insert("payload_hash".to_string(), Value::String(digest));
    hashed
}

fn monetizer_start(cfg: &AdaadConfig, goal: &str, plan: &Plan) -> std::result::Result<(), LedgerError> {
    if !cfg.ledger_enabled {
        return Ok(());
    }
    let mut payload = Map::new();
    payload.insert("archetype".to_string(), json!("monetizer"));
    payload.insert("stage".to_string(), json!("start"));
    payload.insert("goal".to_string(), json!(goal));
    payload.insert(
        "plan".to_string(),
        Value::Array(plan.steps.iter().map(ActionSpec::to_value).collect()),
    );
    append_event(
        cfg,
        "monetizer_run_start",
        hashed_lifecycle_payload(payload),
        &utc_now_iso_z(),
        "monetizer",
    )?;
    Ok(())
}

fn monetizer_complete(
    cfg: &AdaadConfig,
    goal: &str,
    log: Option<&ExecutionLog>,
) -> std::result::Result<(), LedgerError> {
    if !cfg.ledger_enabled {
        return Ok(());
    }
    let mut payload = Map::new();
    payload.insert("archetype".to_string(), json!("monetizer"));
    payload.insert("stage".to_string(), json!("complete"));
    payload.insert("goal".to_string(), json!(goal));
    payload.insert("ok".to_string(), json!(log.map(|l| l.ok).unwrap_or(false)));
    payload.insert(
        "run_id".to_string(),
        log.map(|l| json!(l.context.run_id)).unwrap_or(Value::Null),
    );
    append_event(
        cfg,
        "monetizer_run_complete",
        hashed_lifecycle_payload(payload),
        &utc_now_iso_z(),
        "monetizer",
    )?;
    Ok(())
}

/// The built-in revenue archetype: only revenue-safe built-in actions,
/// mutation-class actions forbidden, ledger required.
pub fn monetizer_archetype() -> ArchetypePolicy {
    ArchetypePolicy::new("monetizer", |mut actions, _cfg| {
        actions.retain(|name| {
            BUILTIN_ACTION_NAMES.contains(&name) && !adaad6_planning::spec::is_mutation_action_name(name)
        });
        actions
    })
    .require_ledger()
    .with_on_start(monetizer_start)
    .with_on_complete(monetizer_complete)
}
