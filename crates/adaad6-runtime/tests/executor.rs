use std::sync::Arc;

use adaad6_config::{AdaadConfig, MutationPolicy, ResourceTier};
use adaad6_evidence::{EvidenceStore, LineageGateResult};
use adaad6_kernel::{CrashCode, KernelContext, KernelCrash, Outcome};
use adaad6_ledger::read_events;
use adaad6_planning::{Action, ActionCatalog, ActionSpec};
use adaad6_runtime::{execute_and_record, execute_plan, ExecuteOptions, ExecutorError};
use serde_json::{json, Map, Value};

type ValidateFn = dyn Fn(&Map<String, Value>, &AdaadConfig) -> Outcome<Value> + Send + Sync;
type RunFn = dyn Fn(Value) -> Outcome<Value> + Send + Sync;
type PostcheckFn = dyn Fn(Value, &AdaadConfig) -> Outcome<Value> + Send + Sync;

struct TestAction {
    validate: Box<ValidateFn>,
    run: Box<RunFn>,
    postcheck: Box<PostcheckFn>,
}

impl TestAction {
    fn echo() -> Arc<dyn Action> {
        Arc::new(Self {
            validate: Box::new(|params, _| Ok(Value::Object(params.clone()))),
            run: Box::new(|validated| Ok(validated)),
            postcheck: Box::new(|result, _| Ok(result)),
        })
    }

    fn with_run(run: impl Fn(Value) -> Outcome<Value> + Send + Sync + 'static) -> Arc<dyn Action> {
        Arc::new(Self {
            validate: Box::new(|params, _| Ok(Value::Object(params.clone()))),
            run: Box::new(run),
            postcheck: Box::new(|result, _| Ok(result)),
        })
    }

    fn with_validate(
        validate: impl Fn(&Map<String, Value>, &AdaadConfig) -> Outcome<Value> + Send + Sync + 'static,
    ) -> Arc<dyn Action> {
        Arc::new(Self {
            validate: Box::new(validate),
            run: Box::new(|validated| Ok(validated)),
            postcheck: Box::new(|result, _| Ok(result)),
        })
    }

    fn with_postcheck(
        postcheck: impl Fn(Value, &AdaadConfig) -> Outcome<Value> + Send + Sync + 'static,
    ) -> Arc<dyn Action> {
        Arc::new(Self {
            validate: Box::new(|params, _| Ok(Value::Object(params.clone()))),
            run: Box::new(|validated| Ok(validated)),
            postcheck: Box::new(postcheck),
        })
    }
}

impl Action for TestAction {
    fn validate(&self, params: &Map<String, Value>, cfg: &AdaadConfig) -> Outcome<Value> {
        (self.validate)(params, cfg)
    }

    fn run(&self, validated: Value) -> Outcome<Value> {
        (self.run)(validated)
    }

    fn postcheck(&self, result: Value, cfg: &AdaadConfig) -> Outcome<Value> {
        (self.postcheck)(result, cfg)
    }
}

fn spec(id: &str, action: &str) -> ActionSpec {
    ActionSpec {
        id: id.to_string(),
        action: action.to_string(),
        params: Map::new(),
        preconditions: Vec::new(),
        effects: Vec::new(),
        cost_hint: None,
    }
}

fn spec_with_effects(id: &str, action: &str, effects: &[&str]) -> ActionSpec {
    ActionSpec {
        effects: effects.iter().map(|s| s.to_string()).collect(),
        ..spec(id, action)
    }
}

fn catalog(entries: Vec<(&str, Arc<dyn Action>)>) -> ActionCatalog {
    let mut catalog = ActionCatalog::new();
    for (name, action) in entries {
        catalog.register(name, action).expect("register");
    }
    catalog
}

fn cfg_in(home: &std::path::Path) -> AdaadConfig {
    AdaadConfig {
        home: home.display().to_string(),
        ..AdaadConfig::default()
    }
}

#[test]
fn successful_execution_logs_all_stages() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = cfg_in(tmp.path());
    let actions = catalog(vec![("demo", TestAction::echo())]);
    let plan = vec![spec("act-001", "demo")];

    let log = execute_plan(&plan, &actions, &cfg, None, &ExecuteOptions::default())
        .expect("execute");

    assert!(log.ok);
    assert_eq!(log.status, "ok");
    assert_eq!(log.steps.len(), 1);
    let step = &log.steps[0];
    assert_eq!(step.status, "ok");
    assert_eq!(
        step.stages.iter().map(|s| s.stage).collect::<Vec<_>>(),
        ["precheck", "execute", "postcheck"]
    );
    assert!(log.crash.is_none());
    assert!(log.context.artifacts.contains("act-001:demo:result"));

    let serialized = log.to_value();
    assert_eq!(serialized["run_id"], json!(log.context.run_id));
    assert_eq!(serialized["config_hash"], json!(log.context.config.hash));
}

#[test]
fn precheck_failure_is_an_integrity_crash() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = cfg_in(tmp.path());
    let actions = catalog(vec![(
        "demo",
        TestAction::with_validate(|_, _| Err(KernelCrash::integrity("bad params"))),
    )]);
    let plan = vec![spec("act-001", "demo")];

    let log = execute_plan(&plan, &actions, &cfg, None, &ExecuteOptions::default())
        .expect("execute");

    assert!(!log.ok);
    assert_eq!(log.status, "crash");
    let crash = log.crash.as_ref().expect("crash summary");
    assert_eq!(crash.code, CrashCode::IntegrityViolation);
    assert_eq!(crash.stage, "precheck");
    assert_eq!(crash.step, "act-001");
    let step = &log.steps[0];
    assert_eq!(step.status, "crash");
    assert_eq!(step.detail.as_deref(), Some("bad params"));
    assert_eq!(step.stages[0].status, "crash");
}

#[test]
fn timeout_crash_halts_successors() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = cfg_in(tmp.path());
    let actions = catalog(vec![
        (
            "hang",
            TestAction::with_run(|_| Err(KernelCrash::determinism("hung"))),
        ),
        ("fine", TestAction::echo()),
    ]);
    let plan = vec![
        spec("act-001", "hang"),
        spec("act-002", "fine"),
        spec("act-003", "fine"),
    ];

    let log = execute_plan(&plan, &actions, &cfg, None, &ExecuteOptions::default())
        .expect("execute");

    assert!(!log.ok);
    let crash = log.crash.as_ref().expect("crash summary");
    assert_eq!(crash.code, CrashCode::DeterminismBreach);
    assert_eq!(crash.stage, "execute");
    assert_eq!(crash.step, "act-001");
    assert_eq!(log.steps[0].status, "crash");
    assert_eq!(log.steps[0].code, Some(CrashCode::DeterminismBreach));
    for skipped in &log.steps[1..] {
        assert_eq!(skipped.status, "skipped");
        assert_eq!(skipped.detail.as_deref(), Some("skipped_after_crash"));
        assert_eq!(skipped.stages[0].detail.as_deref(), Some("halted_after_crash"));
    }
}

#[test]
fn postcheck_crash_preserves_its_code() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = cfg_in(tmp.path());
    let actions = catalog(vec![(
        "demo",
        TestAction::with_postcheck(|_, _| Err(KernelCrash::evidence("missing evidence"))),
    )]);
    let plan = vec![spec("act-001", "demo")];

    let log = execute_plan(&plan, &actions, &cfg, None, &ExecuteOptions::default())
        .expect("execute");

    let crash = log.crash.as_ref().expect("crash summary");
    assert_eq!(crash.code, CrashCode::EvidenceMissing);
    assert_eq!(crash.stage, "postcheck");
    assert_eq!(log.steps[0].detail.as_deref(), Some("missing evidence"));
}

#[test]
fn unknown_action_is_evidence_missing() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = cfg_in(tmp.path());
    let plan = vec![spec("act-001", "unknown")];

    let log = execute_plan(&plan, &ActionCatalog::new(), &cfg, None, &ExecuteOptions::default())
        .expect("execute");

    assert!(!log.ok);
    let crash = log.crash.as_ref().expect("crash summary");
    assert_eq!(crash.code, CrashCode::EvidenceMissing);
    assert_eq!(crash.stage, "precheck");
}

#[test]
fn provided_context_is_used() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = cfg_in(tmp.path());
    let ctx = KernelContext::build_with_run_id(&cfg, "fixed-run").expect("context");
    let actions = catalog(vec![("demo", TestAction::echo())]);
    let plan = vec![spec("act-001", "demo")];

    let log = execute_plan(&plan, &actions, &cfg, Some(ctx), &ExecuteOptions::default())
        .expect("execute");

    assert_eq!(log.context.run_id, "fixed-run");
    assert!(log.context.artifacts.contains("act-001:demo:result"));
}

#[test]
fn serialized_log_includes_crash_summary() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = cfg_in(tmp.path());
    let actions = catalog(vec![(
        "demo",
        TestAction::with_run(|_| Err(KernelCrash::determinism("determinism breach"))),
    )]);
    let plan = vec![spec("act-001", "demo")];

    let log = execute_plan(&plan, &actions, &cfg, None, &ExecuteOptions::default())
        .expect("execute");
    let serialized = log.to_value();

    assert_eq!(serialized["ok"], json!(false));
    assert_eq!(
        serialized["crash"],
        json!({
            "code": "CRASH_0x03",
            "detail": "determinism breach",
            "stage": "execute",
            "step": "act-001",
        })
    );
    assert_eq!(serialized["steps"][0]["stages"][1]["stage"], json!("execute"));
    assert_eq!(serialized["steps"][0]["stages"][1]["code"], json!("CRASH_0x03"));
}

#[test]
fn debug_detail_is_hidden_from_serialized_output() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = cfg_in(tmp.path());
    let actions = catalog(vec![(
        "demo",
        TestAction::with_validate(|_, _| Err(KernelCrash::determinism("boom"))),
    )]);
    let plan = vec![spec("act-001", "demo")];

    let opts = ExecuteOptions {
        capture_debug: true,
        ..ExecuteOptions::default()
    };
    let log = execute_plan(&plan, &actions, &cfg, None, &opts).expect("execute");

    let stage = &log.steps[0].stages[0];
    assert!(stage.debug_detail().is_some());
    let serialized = stage.to_value();
    assert!(serialized.get("debug_detail").is_none());
    assert_eq!(serialized["detail"], json!("boom"));
}

#[test]
fn recording_writes_the_event_sequence() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = AdaadConfig {
        ledger_enabled: true,
        ..cfg_in(tmp.path())
    };
    let actions = catalog(vec![("demo", TestAction::echo())]);
    let plan = vec![spec("act-001", "demo")];

    let log = execute_and_record(
        &plan,
        &actions,
        &cfg,
        None,
        "executor",
        false,
        &ExecuteOptions::default(),
    )
    .expect("execute");
    assert!(log.ok);

    let events = read_events(&cfg, None).expect("read");
    assert_eq!(
        events
            .iter()
            .map(|e| e["type"].as_str().unwrap_or(""))
            .collect::<Vec<_>>(),
        ["execution_run_start", "execution_step", "execution_artifact", "execution_run_end"]
    );
    for event in &events {
        assert!(event["payload"]["content_hash"].is_string());
        assert_eq!(event["payload"]["run_id"], json!(log.context.run_id));
    }
    let artifact = &events[2];
    assert_eq!(artifact["payload"]["parent_hash"], Value::Null);
    assert_eq!(artifact["payload"]["action_id"], json!("act-001"));
}

#[test]
fn artifact_events_chain_by_parent_hash() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = AdaadConfig {
        ledger_enabled: true,
        ..cfg_in(tmp.path())
    };
    let actions = catalog(vec![("demo", TestAction::echo())]);
    let plan = vec![spec("act-001", "demo"), spec("act-002", "demo")];

    execute_and_record(
        &plan,
        &actions,
        &cfg,
        None,
        "executor",
        false,
        &ExecuteOptions::default(),
    )
    .expect("execute");

    let events = read_events(&cfg, None).expect("read");
    let artifacts: Vec<&Value> = events
        .iter()
        .filter(|e| e["type"] == json!("execution_artifact"))
        .collect();
    assert_eq!(artifacts.len(), 2);
    assert_eq!(artifacts[0]["payload"]["parent_hash"], Value::Null);
    assert_eq!(
        artifacts[1]["payload"]["parent_hash"],
        artifacts[0]["payload"]["content_hash"]
    );
}

#[test]
fn ledger_required_fails_before_executing() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let actions = catalog(vec![("demo", TestAction::echo())]);
    let plan = vec![spec("act-001", "demo")];

    let disabled = cfg_in(tmp.path());
    let err = execute_and_record(
        &plan,
        &actions,
        &disabled,
        None,
        "executor",
        true,
        &ExecuteOptions::default(),
    )
    .expect_err("disabled ledger");
    assert!(matches!(err, ExecutorError::LedgerRequired(_)));

    let readonly = AdaadConfig {
        ledger_enabled: true,
        ledger_readonly: true,
        ..cfg_in(tmp.path())
    };
    let err = execute_and_record(
        &plan,
        &actions,
        &readonly,
        None,
        "executor",
        true,
        &ExecuteOptions::default(),
    )
    .expect_err("readonly ledger");
    assert!(matches!(err, ExecutorError::LedgerRequired(_)));
}

#[test]
fn readonly_ledger_fails_even_when_not_required() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = AdaadConfig {
        ledger_enabled: true,
        ledger_readonly: true,
        ..cfg_in(tmp.path())
    };
    let actions = catalog(vec![("demo", TestAction::echo())]);
    let plan = vec![spec("act-001", "demo")];

    let err = execute_and_record(
        &plan,
        &actions,
        &cfg,
        None,
        "executor",
        false,
        &ExecuteOptions::default(),
    )
    .expect_err("append must fail");
    assert!(matches!(err, ExecutorError::Ledger(_)));
}

#[test]
fn mutation_steps_require_a_lineage_gate_outside_evolutionary() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let actions = catalog(vec![
        ("demo", TestAction::echo()),
        ("mutate_code", TestAction::echo()),
        ("custom_mutator", TestAction::echo()),
    ]);
    let cfg = AdaadConfig {
        mutation_policy: MutationPolicy::Sandboxed,
        resource_tier: ResourceTier::Server,
        ..cfg_in(tmp.path())
    };

    // Non-mutation plans run without lineage proof.
    let log = execute_plan(
        &[spec("act-001", "demo")],
        &actions,
        &cfg,
        None,
        &ExecuteOptions::default(),
    )
    .expect("execute");
    assert!(log.ok);

    // Mutation plans (by name or effect) need the gate.
    let err = execute_plan(
        &[spec("act-001", "mutate_code")],
        &actions,
        &cfg,
        None,
        &ExecuteOptions::default(),
    )
    .expect_err("no lineage");
    assert!(matches!(err, ExecutorError::LineageGate { .. }));

    let err = execute_plan(
        &[spec_with_effects("act-003", "custom_mutator", &["mutation"])],
        &actions,
        &cfg,
        None,
        &ExecuteOptions::default(),
    )
    .expect_err("no lineage");
    assert!(matches!(err, ExecutorError::LineageGate { .. }));

    // A registered lineage satisfies the gate.
    let mut store = EvidenceStore::new();
    let lineage_hash = store.add_lineage(&json!({"ancestor": "root"}));
    let opts = ExecuteOptions {
        evidence_store: Some(&store),
        lineage_hash: Some(&lineage_hash),
        ..ExecuteOptions::default()
    };
    let log = execute_plan(&[spec("act-001", "mutate_code")], &actions, &cfg, None, &opts)
        .expect("execute");
    assert!(log.ok);
}

#[test]
fn precomputed_gate_is_bound_to_its_lineage() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let actions = catalog(vec![("mutate_code", TestAction::echo())]);
    let cfg = AdaadConfig {
        mutation_policy: MutationPolicy::Sandboxed,
        resource_tier: ResourceTier::Server,
        ..cfg_in(tmp.path())
    };
    let mut store = EvidenceStore::new();
    let lineage_hash = store.add_lineage(&json!({"ancestor": "root"}));
    let plan = vec![spec("act-001", "mutate_code")];

    let ok_gate = LineageGateResult::pass(lineage_hash.clone());
    let opts = ExecuteOptions {
        evidence_store: Some(&store),
        lineage_hash: Some(&lineage_hash),
        gate_result: Some(&ok_gate),
        ..ExecuteOptions::default()
    };
    let log = execute_plan(&plan, &actions, &cfg, None, &opts).expect("execute");
    assert!(log.ok);

    // A verdict for a different lineage is refused.
    let mismatched = LineageGateResult::pass("other");
    let opts = ExecuteOptions {
        evidence_store: Some(&store),
        lineage_hash: Some(&lineage_hash),
        gate_result: Some(&mismatched),
        ..ExecuteOptions::default()
    };
    let err = execute_plan(&plan, &actions, &cfg, None, &opts).expect_err("mismatch");
    assert!(matches!(err, ExecutorError::GateMismatch));

    // A verdict without backing evidence is refused.
    let unbacked = LineageGateResult::pass("missing");
    let opts = ExecuteOptions {
        evidence_store: None,
        lineage_hash: Some("missing"),
        gate_result: Some(&unbacked),
        ..ExecuteOptions::default()
    };
    let err = execute_plan(&plan, &actions, &cfg, None, &opts).expect_err("unbacked");
    assert!(matches!(err, ExecutorError::LineageGate { .. }));
}

#[test]
fn evolutionary_without_readiness_sig_is_refused() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let actions = catalog(vec![("demo", TestAction::echo())]);
    let cfg = AdaadConfig {
        mutation_policy: MutationPolicy::Evolutionary,
        ..cfg_in(tmp.path())
    };

    let err = execute_plan(
        &[spec("act-001", "demo")],
        &actions,
        &cfg,
        None,
        &ExecuteOptions::default(),
    )
    .expect_err("blank readiness sig");
    assert!(matches!(err, ExecutorError::ReadinessFreeze(_)));
}

#[test]
fn oversized_outputs_degrade_to_hash_uris() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = cfg_in(tmp.path());
    let actions = catalog(vec![(
        "big",
        TestAction::with_run(|_| Ok(json!({"blob": "x".repeat(70_000)}))),
    )]);
    let plan = vec![spec("act-001", "big")];

    let log = execute_plan(&plan, &actions, &cfg, None, &ExecuteOptions::default())
        .expect("execute");

    let uri = log
        .context
        .artifacts
        .iter()
        .find(|(name, _)| *name == "act-001:big:result")
        .map(|(_, uri)| uri.to_string())
        .expect("artifact");
    assert!(uri.starts_with("data:application/json,"));
    assert!(uri.len() < 1_000, "oversized output must not inline");
    assert!(uri.contains("truncated"));
}
