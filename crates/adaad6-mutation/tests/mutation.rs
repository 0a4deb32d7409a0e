use adaad6_config::{AdaadConfig, MutationPolicy, ResourceTier};
use adaad6_evidence::EvidenceStore;
use adaad6_ledger::read_events;
use adaad6_mutation::{mutate_source, WORKER_ENV};
use serde_json::json;

fn use_built_worker() {
    std::env::set_var(WORKER_ENV, env!("CARGO_BIN_EXE_adaad6-mutation-worker"));
}

fn sandboxed_cfg(home: &std::path::Path) -> AdaadConfig {
    AdaadConfig {
        home: home.display().to_string(),
        mutation_policy: MutationPolicy::Sandboxed,
        resource_tier: ResourceTier::Server,
        planner_max_seconds: 5.0,
        ..AdaadConfig::default()
    }
}

fn lineage() -> (EvidenceStore, String) {
    let mut store = EvidenceStore::new();
    let hash = store.add_lineage(&json!({"ancestor": "root"}));
    (store, hash)
}

#[test]
fn drop_pass_produces_a_runnable_candidate() {
    use_built_worker();
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = sandboxed_cfg(tmp.path());
    let (store, hash) = lineage();

    let src = "pass\nx = 1 + 2\npass\ny = x * 3\n";
    let report = mutate_source(&cfg, src, None, Some(&store), Some(&hash)).expect("mutate");

    assert!(!report.skipped);
    assert!(report.ast_ok);
    assert!(report.allowlist_ok);
    assert!(report.sandbox_ok, "reason: {:?}", report.reason);
    assert_eq!(report.mutation_kind.as_deref(), Some("drop_pass"));
    assert!(!report.mutated_src.contains("pass"));
    assert_eq!(report.score, 1.0);
    // Sandboxed policy never auto-promotes.
    assert!(!report.auto_promote);

    // The accepted candidate re-parses cleanly.
    adaad6_mutation::ast::parse(&report.mutated_src).expect("mutated source parses");
}

#[test]
fn unchanged_sources_report_no_mutation_kind() {
    use_built_worker();
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = sandboxed_cfg(tmp.path());
    let (store, hash) = lineage();

    let report = mutate_source(&cfg, "x = 41 + 1\n", None, Some(&store), Some(&hash))
        .expect("mutate");
    assert!(report.sandbox_ok);
    assert_eq!(report.mutation_kind, None);
}

#[test]
fn imports_outside_the_allowlist_are_rejected() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = sandboxed_cfg(tmp.path());
    let (store, hash) = lineage();

    let src = "import os\nx = 1\n";
    let report = mutate_source(&cfg, src, None, Some(&store), Some(&hash)).expect("mutate");

    assert!(!report.allowlist_ok);
    assert!(!report.sandbox_ok);
    assert_eq!(report.reason.as_deref(), Some("import_not_allowed"));
    assert!(!report.auto_promote);
}

#[test]
fn allowlisted_imports_pass() {
    use_built_worker();
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = sandboxed_cfg(tmp.path());
    let (store, hash) = lineage();

    let src = "import math\nx = math.sqrt(9.0)\n";
    let report = mutate_source(&cfg, src, None, Some(&store), Some(&hash)).expect("mutate");
    assert!(report.allowlist_ok);
    assert!(report.sandbox_ok, "reason: {:?}", report.reason);
}

#[test]
fn locked_policy_skips() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = AdaadConfig {
        mutation_policy: MutationPolicy::Locked,
        ..sandboxed_cfg(tmp.path())
    };
    let (store, hash) = lineage();

    let report = mutate_source(&cfg, "x = 1\n", None, Some(&store), Some(&hash)).expect("mutate");
    assert!(report.skipped);
    assert_eq!(report.reason.as_deref(), Some("mutation_policy_locked"));
}

#[test]
fn mobile_tier_skips() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = AdaadConfig {
        resource_tier: ResourceTier::Mobile,
        ..sandboxed_cfg(tmp.path())
    };
    let (store, hash) = lineage();

    let report = mutate_source(&cfg, "x = 1\n", None, Some(&store), Some(&hash)).expect("mutate");
    assert!(report.skipped);
    assert_eq!(report.reason.as_deref(), Some("resource_tier=mobile"));
}

#[test]
fn missing_lineage_skips_with_gate_reason() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = sandboxed_cfg(tmp.path());

    let report = mutate_source(&cfg, "x = 1\n", None, None, None).expect("mutate");
    assert!(report.skipped);
    assert_eq!(report.reason.as_deref(), Some("cryovant_lineage_missing"));

    let (store, _) = lineage();
    let report = mutate_source(&cfg, "x = 1\n", None, Some(&store), Some("unknown"))
        .expect("mutate");
    assert!(report.skipped);
    assert_eq!(report.reason.as_deref(), Some("cryovant_lineage_unknown"));
}

#[test]
fn promotion_requires_the_doctor_gate() {
    use_built_worker();
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = AdaadConfig {
        mutation_policy: MutationPolicy::Evolutionary,
        ..sandboxed_cfg(tmp.path())
    };
    let (store, hash) = lineage();

    // No doctor report on disk: sandbox succeeds, promotion is withheld.
    let report = mutate_source(&cfg, "x = 1 + 1\n", None, Some(&store), Some(&hash))
        .expect("mutate");
    assert!(report.sandbox_ok, "reason: {:?}", report.reason);
    assert_eq!(report.reason.as_deref(), Some("requires_doctor_gate"));
    assert!(!report.auto_promote);
    assert!(!report.doctor_gate_ok);
}

#[test]
fn promotion_happens_with_a_passing_doctor_report() {
    use_built_worker();
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = AdaadConfig {
        mutation_policy: MutationPolicy::Evolutionary,
        ..sandboxed_cfg(tmp.path())
    };
    let (store, hash) = lineage();

    let doctor_dir = tmp.path().join(".adaad/doctor");
    std::fs::create_dir_all(&doctor_dir).expect("mkdir");
    std::fs::write(
        doctor_dir.join("latest.json"),
        serde_json::to_string(&json!({"status": "PASS", "ok": true})).expect("encode"),
    )
    .expect("write report");

    let report = mutate_source(&cfg, "x = 1 + 1\n", None, Some(&store), Some(&hash))
        .expect("mutate");
    assert!(report.sandbox_ok, "reason: {:?}", report.reason);
    assert!(report.doctor_gate_ok);
    assert!(report.auto_promote);
    assert_eq!(report.reason, None);
}

#[test]
fn failing_doctor_report_withholds_promotion() {
    use_built_worker();
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = AdaadConfig {
        mutation_policy: MutationPolicy::Evolutionary,
        ..sandboxed_cfg(tmp.path())
    };
    let (store, hash) = lineage();

    let doctor_dir = tmp.path().join(".adaad/doctor");
    std::fs::create_dir_all(&doctor_dir).expect("mkdir");
    std::fs::write(doctor_dir.join("latest.json"), r#"{"status": "FAIL"}"#)
        .expect("write report");

    let report = mutate_source(&cfg, "x = 1\n", None, Some(&store), Some(&hash))
        .expect("mutate");
    assert!(!report.auto_promote);
    assert_eq!(report.reason.as_deref(), Some("requires_doctor_gate"));
}

#[test]
fn runaway_candidates_time_out() {
    use_built_worker();
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = sandboxed_cfg(tmp.path());
    let (store, hash) = lineage();

    let src = "x = 0\nwhile 0 < 1 { x = x + 1 }\n";
    let report = mutate_source(&cfg, src, Some(0.3), Some(&store), Some(&hash))
        .expect("mutate");
    assert!(report.timeout);
    assert!(!report.sandbox_ok);
    assert_eq!(report.reason.as_deref(), Some("timeout"));
}

#[test]
fn runtime_errors_surface_as_sandbox_errors() {
    use_built_worker();
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = sandboxed_cfg(tmp.path());
    let (store, hash) = lineage();

    let report = mutate_source(&cfg, "x = 1 / 0\n", None, Some(&store), Some(&hash))
        .expect("mutate");
    assert!(!report.sandbox_ok);
    assert!(!report.timeout);
    assert_eq!(report.reason.as_deref(), Some("sandbox_error"));
    assert_eq!(report.score, 0.0);
}

#[test]
fn attempts_are_recorded_in_the_ledger() {
    use_built_worker();
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = AdaadConfig {
        ledger_enabled: true,
        ..sandboxed_cfg(tmp.path())
    };
    let (store, hash) = lineage();

    let report = mutate_source(&cfg, "x = 1\n", None, Some(&store), Some(&hash))
        .expect("mutate");
    assert!(report.ledger_event.is_some());

    let events = read_events(&cfg, None).expect("read");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], json!("mutation_attempt"));
    assert_eq!(events[0]["payload"]["sandbox_ok"], json!(true));
    assert_eq!(events[0]["actor"], json!("mutate_code"));
}

#[test]
fn empty_sources_are_integrity_crashes() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = sandboxed_cfg(tmp.path());
    let err = mutate_source(&cfg, "   \n", None, None, None).expect_err("empty src");
    assert_eq!(err.code, adaad6_kernel::CrashCode::IntegrityViolation);
}
