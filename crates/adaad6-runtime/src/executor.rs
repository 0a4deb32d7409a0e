//! The three-stage executor

use adaad6_config::{AdaadConfig, ConfigError, FreezeReason, MutationPolicy};
use adaad6_crypto::canon::canonical_json;
use adaad6_crypto::hash::{hash_object, sha256_hex};
use adaad6_evidence::{cryovant_lineage_gate, EvidenceStore, LineageGateResult};
use adaad6_kernel::{ContextError, CrashCode, KernelCrash, KernelContext};
use adaad6_ledger::{append_event, utc_now_iso_z, LedgerError};
use adaad6_planning::{is_mutation_step, ActionCatalog, ActionSpec};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Step outputs above this size degrade to a hash-only artifact URI.
pub const ARTIFACT_INLINE_MAX_BYTES: usize = 65_536;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("readiness gate unsatisfied: {0:?}")]
    ReadinessFreeze(FreezeReason),

    #[error("lineage gate rejected: {reason}")]
    LineageGate { reason: String },

    #[error("precomputed lineage gate does not match the expected lineage")]
    GateMismatch,

    #[error("ledger required but {0}")]
    LedgerRequired(&'static str),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub type Result<T> = std::result::Result<T, ExecutorError>;

/// One stage of one step.
#[derive(Debug, Clone)]
pub struct StageLog {
    pub stage: &'static str,
    pub status: &'static str,
    pub output: Option<Value>,
    pub code: Option<CrashCode>,
    pub detail: Option<String>,
    debug_detail: Option<String>,
}

impl StageLog {
    fn ok(stage: &'static str, output: Option<Value>) -> Self {
        Self {
            stage,
            status: "ok",
            output,
            code: None,
            detail: None,
            debug_detail: None,
        }
    }

    fn crash(stage: &'static str, crash: &KernelCrash, capture_debug: bool) -> Self {
        Self {
            stage,
            status: "crash",
            output: None,
            code: Some(crash.code),
            detail: Some(crash.detail.clone()),
            debug_detail: if capture_debug {
                crash.debug_detail().map(str::to_string)
            } else {
                None
            },
        }
    }

    fn skipped(stage: &'static str, detail: &str) -> Self {
        Self {
            stage,
            status: "skipped",
            output: None,
            code: None,
            detail: Some(detail.to_string()),
            debug_detail: None,
        }
    }

    /// Debug traces never appear here.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("stage".to_string(), json!(self.stage));
        map.insert("status".to_string(), json!(self.status));
        if let Some(output) = &self.output {
            map.insert("output".to_string(), output.clone());
        }
        if let Some(code) = &self.code {
            map.insert("code".to_string(), json!(code.as_str()));
        }
        if let Some(detail) = &self.detail {
            map.insert("detail".to_string(), json!(detail));
        }
        Value::Object(map)
    }

    pub fn debug_detail(&self) -> Option<&str> {
        self.debug_detail.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct StepLog {
    pub id: String,
    pub action: String,
    pub status: &'static str,
    pub stages: Vec<StageLog>,
    pub output: Option<Value>,
    pub code: Option<CrashCode>,
    pub detail: Option<String>,
}

impl StepLog {
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".to_string(), json!(self.id));
        map.insert("action".to_string(), json!(self.action));
        map.insert("status".to_string(), json!(self.status));
        map.insert(
            "stages".to_string(),
            Value::Array(self.stages.iter().map(StageLog::to_value).collect()),
        );
        if let Some(output) = &self.output {
            map.insert("output".to_string(), output.clone());
        }
        if let Some(code) = &self.code {
            map.insert("code".to_string(), json!(code.as_str()));
        }
        if let Some(detail) = &self.detail {
            map.insert("detail".to_string(), json!(detail));
        }
        Value::Object(map)
    }
}

#[derive(Debug, Clone)]
pub struct CrashSummary {
    pub code: CrashCode,
    pub detail: String,
    pub stage: &'static str,
    pub step: String,
}

#[derive(Debug, Clone)]
pub struct ExecutionLog {
    pub ok: bool,
    pub status: &'static str,
    pub steps: Vec<StepLog>,
    pub context: KernelContext,
    pub crash: Option<CrashSummary>,
}

impl ExecutionLog {
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("ok".to_string(), json!(self.ok));
        map.insert("status".to_string(), json!(self.status));
        map.insert(
            "steps".to_string(),
            Value::Array(self.steps.iter().map(StepLog::to_value).collect()),
        );
        map.insert("run_id".to_string(), json!(self.context.run_id));
        map.insert("config_hash".to_string(), json!(self.context.config.hash));
        map.insert("artifacts".to_string(), self.context.artifacts.to_value());
        map.insert("workspace".to_string(), self.context.workspace.to_value());
        if let Some(crash) = &self.crash {
            map.insert(
                "crash".to_string(),
                json!({
                    "code": crash.code.as_str(),
                    "detail": crash.detail,
                    "stage": crash.stage,
                    "step": crash.step,
                }),
            );
        }
        Value::Object(map)
    }
}

/// Optional evidence inputs for a run.
#[derive(Default)]
pub struct ExecuteOptions<'a> {
    pub evidence_store: Option<&'a EvidenceStore>,
    pub lineage_hash: Option<&'a str>,
    pub gate_result: Option<&'a LineageGateResult>,
    pub capture_debug: bool,
}

fn percent_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() * 3);
    for byte in raw.as_bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'.' | b'~' | b'-' => {
                out.push(*byte as char);
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

fn artifact_uri(output: &Value) -> String {
    let serialized = canonical_json(output);
    if serialized.len() > ARTIFACT_INLINE_MAX_BYTES {
        let digest = sha256_hex(serialized.as_bytes());
        let truncated = canonical_json(&json!({"hash": digest, "truncated": true}));
        return format!("data:application/json,{}", percent_encode(&truncated));
    }
    format!("data:application/json,{}", percent_encode(&serialized))
}

fn capture(crash: KernelCrash, spec: &ActionSpec, stage: &str, capture_debug: bool) -> KernelCrash {
    if capture_debug {
        crash.with_debug(format!(
            "step={} action={} stage={stage}",
            spec.id, spec.action
        ))
    } else {
        crash
    }
}

fn execute_step(
    spec: &ActionSpec,
    actions: &ActionCatalog,
    cfg: &AdaadConfig,
    capture_debug: bool,
) -> StepLog {
    let crash_step = |stages: Vec<StageLog>, crash: &KernelCrash| StepLog {
        id: spec.id.clone(),
        action: spec.action.clone(),
        status: "crash",
        stages,
        output: None,
        code: Some(crash.code),
        detail: Some(crash.detail.clone()),
    };

    let Some(action) = actions.get(&spec.action) else {
        let crash = capture(
            KernelCrash::evidence(format!("Unknown action: {}", spec.action)),
            spec,
            "precheck",
            capture_debug,
        );
        let stages = vec![StageLog::crash("precheck", &crash, capture_debug)];
        return crash_step(stages, &crash);
    };

    let mut stages = Vec::with_capacity(3);

    let validated = match action.validate(&spec.params, cfg) {
        Ok(validated) => {
            stages.push(StageLog::ok("precheck", Some(validated.clone())));
            validated
        }
        Err(crash) => {
            let crash = capture(crash, spec, "precheck", capture_debug);
            stages.push(StageLog::crash("precheck", &crash, capture_debug));
            return crash_step(stages, &crash);
        }
    };

    let result = match action.run(validated) {
        Ok(result) => {
            stages.push(StageLog::ok("execute", Some(result.clone())));
            result
        }
        Err(crash) => {
            let crash = capture(crash, spec, "execute", capture_debug);
            stages.push(StageLog::crash("execute", &crash, capture_debug));
            return crash_step(stages, &crash);
        }
    };

    let checked = match action.postcheck(result, cfg) {
        Ok(checked) => {
            stages.push(StageLog::ok("postcheck", Some(checked.clone())));
            checked
        }
        Err(crash) => {
            let crash = capture(crash, spec, "postcheck", capture_debug);
            stages.push(StageLog::crash("postcheck", &crash, capture_debug));
            return crash_step(stages, &crash);
        }
    };

    StepLog {
        id: spec.id.clone(),
        action: spec.action.clone(),
        status: "ok",
        stages,
        output: if checked.is_null() { None } else { Some(checked) },
        code: None,
        detail: None,
    }
}

fn hashed_payload(mut payload: Map<String, Value>) -> Map<String, Value> {
    let content_hash = hash_object(&Value::Object(payload.clone()));
    payload.insert("content_hash".to_string(), Value::String(content_hash));
    payload
}

/// Ledger recording state for one run.
struct Recorder<'a> {
    cfg: &'a AdaadConfig,
    actor: &'a str,
    last_artifact_content_hash: Option<String>,
}

impl Recorder<'_> {
    fn append(&self, event_type: &str, payload: Map<String, Value>) -> Result<Value> {
        Ok(append_event(
            self.cfg,
            event_type,
            hashed_payload(payload),
            &utc_now_iso_z(),
            self.actor,
        )?)
    }

    fn record_step(&mut self, step: &StepLog, run_id: &str) -> Result<()> {
        let mut payload = Map::new();
        payload.insert("run_id".to_string(), json!(run_id));
        payload.insert("step".to_string(), step.to_value());
        self.append("execution_step", payload)?;
        Ok(())
    }

    fn record_artifact(
        &mut self,
        run_id: &str,
        action_id: &str,
        name: &str,
        uri: &str,
    ) -> Result<()> {
        let mut payload = Map::new();
        payload.insert("run_id".to_string(), json!(run_id));
        payload.insert("action_id".to_string(), json!(action_id));
        payload.insert("name".to_string(), json!(name));
        payload.insert("uri".to_string(), json!(uri));
        payload.insert(
            "parent_hash".to_string(),
            self.last_artifact_content_hash
                .as_ref()
                .map(|h| json!(h))
                .unwrap_or(Value::Null),
        );
        let event = self.append("execution_artifact", payload)?;
        self.last_artifact_content_hash = event["payload"]["content_hash"]
            .as_str()
            .map(str::to_string);
        Ok(())
    }
}

/// Shared preconditions: config validity, readiness, lineage gating.
fn preflight(plan: &[ActionSpec], cfg: &AdaadConfig, opts: &ExecuteOptions) -> Result<()> {
    cfg.validate()?;

    if cfg.mutation_policy == MutationPolicy::Evolutionary
        && cfg.readiness_gate_sig.trim().is_empty()
    {
        return Err(ExecutorError::ReadinessFreeze(
            FreezeReason::ReadinessGateSignatureMissing,
        ));
    }

    let mutation_present = plan.iter().any(is_mutation_step);
    if mutation_present && cfg.mutation_policy != MutationPolicy::Evolutionary {
        let expected = opts
            .lineage_hash
            .map(str::to_string)
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| cfg.readiness_gate_sig.clone());

        match opts.gate_result {
            Some(gate) => {
                if !gate.ok {
                    return Err(ExecutorError::LineageGate {
                        reason: gate
                            .reason
                            .clone()
                            .unwrap_or_else(|| "cryovant_lineage_blocked".to_string()),
                    });
                }
                // A precomputed verdict is only honored for the lineage it
                // proved, and only while the store still resolves it.
                if gate.lineage_hash.as_deref() != Some(expected.as_str()) {
                    return Err(ExecutorError::GateMismatch);
                }
                let backed = opts
                    .evidence_store
                    .map(|store| store.resolve_lineage(&expected).is_some())
                    .unwrap_or(false);
                if !backed {
                    return Err(ExecutorError::LineageGate {
                        reason: "cryovant_lineage_unknown".to_string(),
                    });
                }
            }
            None => {
                let gate = cryovant_lineage_gate(opts.evidence_store, Some(&expected));
                if !gate.ok {
                    return Err(ExecutorError::LineageGate {
                        reason: gate
                            .reason
                            .unwrap_or_else(|| "cryovant_lineage_blocked".to_string()),
                    });
                }
            }
        }
    }
    Ok(())
}

fn run_plan(
    plan: &[ActionSpec],
    actions: &ActionCatalog,
    cfg: &AdaadConfig,
    mut context: KernelContext,
    capture_debug: bool,
    mut recorder: Option<&mut Recorder<'_>>,
) -> Result<ExecutionLog> {
    let mut steps: Vec<StepLog> = Vec::with_capacity(plan.len());
    let mut crash: Option<CrashSummary> = None;
    let run_id = context.run_id.clone();

    for spec in plan {
        if crash.is_some() {
            let step = StepLog {
                id: spec.id.clone(),
                action: spec.action.clone(),
                status: "skipped",
                stages: vec![StageLog::skipped("precheck", "halted_after_crash")],
                output: None,
                code: None,
                detail: Some("skipped_after_crash".to_string()),
            };
            if let Some(recorder) = recorder.as_deref_mut() {
                recorder.record_step(&step, &run_id)?;
            }
            steps.push(step);
            continue;
        }

        let step = execute_step(spec, actions, cfg, capture_debug);

        let mut artifact: Option<(String, String)> = None;
        if step.status == "ok" {
            if let Some(output) = &step.output {
                let name = format!("{}:{}:result", spec.id, spec.action);
                let uri = artifact_uri(output);
                context = context.register_artifact(&name, &uri)?;
                artifact = Some((name, uri));
            }
        }

        if let Some(recorder) = recorder.as_deref_mut() {
            recorder.record_step(&step, &run_id)?;
            if let Some((name, uri)) = &artifact {
                recorder.record_artifact(&run_id, &spec.id, name, uri)?;
            }
        }

        if step.status != "ok" {
            tracing::warn!(
                step = %spec.id,
                action = %spec.action,
                code = step.code.map(|c| c.as_str()).unwrap_or(""),
                "step crashed; halting successors"
            );
            crash = Some(CrashSummary {
                code: step.code.unwrap_or(CrashCode::DeterminismBreach),
                detail: step.detail.clone().unwrap_or_default(),
                stage: step
                    .stages
                    .iter()
                    .find(|stage| stage.status == "crash")
                    .map(|stage| stage.stage)
                    .unwrap_or("precheck"),
                step: spec.id.clone(),
            });
        }
        steps.push(step);
    }

    let ok = crash.is_none();
    Ok(ExecutionLog {
        ok,
        status: if ok { "ok" } else { "crash" },
        steps,
        context,
        crash,
    })
}

/// Execute a plan without ledger recording.
pub fn execute_plan(
    plan: &[ActionSpec],
    actions: &ActionCatalog,
    cfg: &AdaadConfig,
    ctx: Option<KernelContext>,
    opts: &ExecuteOptions,
) -> Result<ExecutionLog> {
    preflight(plan, cfg, opts)?;
    let context = match ctx {
        Some(ctx) => ctx,
        None => KernelContext::build(cfg)?,
    };
    run_plan(plan, actions, cfg, context, opts.capture_debug, None)
}

/// Execute a plan, recording `execution_run_start`, one `execution_step`
/// per spec, an `execution_artifact` per registered artifact, and
/// `execution_run_end`. When `ledger_required` is set, a disabled or
/// read-only ledger fails the run before any step executes.
pub fn execute_and_record(
    plan: &[ActionSpec],
    actions: &ActionCatalog,
    cfg: &AdaadConfig,
    ctx: Option<KernelContext>,
    actor: &str,
    ledger_required: bool,
    opts: &ExecuteOptions,
) -> Result<ExecutionLog> {
    preflight(plan, cfg, opts)?;
    let context = match ctx {
        Some(ctx) => ctx,
        None => KernelContext::build(cfg)?,
    };

    if ledger_required {
        if !cfg.ledger_enabled {
            return Err(ExecutorError::LedgerRequired("ledger is disabled"));
        }
        if cfg.ledger_readonly {
            return Err(ExecutorError::LedgerRequired("ledger is read-only"));
        }
    }
    if !cfg.ledger_enabled {
        return run_plan(plan, actions, cfg, context, opts.capture_debug, None);
    }

    let mut recorder = Recorder {
        cfg,
        actor,
        last_artifact_content_hash: None,
    };

    let run_id = context.run_id.clone();
    let mut start_payload = Map::new();
    start_payload.insert("run_id".to_string(), json!(run_id));
    start_payload.insert("config_hash".to_string(), json!(context.config.hash));
    recorder.append("execution_run_start", start_payload)?;

    let outcome = run_plan(
        plan,
        actions,
        cfg,
        context,
        opts.capture_debug,
        Some(&mut recorder),
    );

    let end_payload = |log: Option<&ExecutionLog>| {
        let mut payload = Map::new();
        payload.insert("run_id".to_string(), json!(run_id));
        payload.insert(
            "log".to_string(),
            log.map(ExecutionLog::to_value)
                .unwrap_or_else(|| json!({"ok": false, "status": "crash"})),
        );
        payload
    };

    match outcome {
        Ok(log) => {
            recorder.append("execution_run_end", end_payload(Some(&log)))?;
            Ok(log)
        }
        Err(err) => {
            // Best effort: the run end marker must not mask the original
            // failure.
            let _ = recorder.append("execution_run_end", end_payload(None));
            Err(err)
        }
    }
}
