use std::collections::BTreeMap;

use adaad6_config::{
    enforce_readiness_gate, load_config, sign_env_payload, sign_readiness_payload, AdaadConfig,
    ConfigError, EffectiveConfig, EnvKeyProvider, FreezeReason, Mode, MutationPolicy,
    ResourceTier, StaticKeyProvider,
};

fn env(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn defaults_load_operational() {
    let effective = load_config(&env(&[]), &EnvKeyProvider).expect("load");
    assert!(!effective.is_frozen());
    let cfg = effective.config();
    assert_eq!(cfg.mode, Mode::Dev);
    assert_eq!(cfg.mutation_policy, MutationPolicy::Locked);
    assert!(cfg.agents_enabled);
    assert!(cfg.freeze_reason.is_none());
}

#[test]
fn freeze_on_missing_signature_when_required() {
    let source = env(&[("ADAAD6_CONFIG_SIG_REQUIRED", "true")]);
    let effective = load_config(&source, &EnvKeyProvider).expect("load");

    let EffectiveConfig::Frozen(cfg, reason) = effective else {
        panic!("expected frozen config");
    };
    assert_eq!(reason, FreezeReason::ConfigSigInvalid);
    assert!(cfg.emergency_halt);
    assert_eq!(cfg.mutation_policy, MutationPolicy::Locked);
    assert!(cfg.ledger_enabled);
    assert!(cfg.ledger_readonly);
    assert!(!cfg.agents_enabled);
    assert_eq!(cfg.planner_max_steps, 1);
    assert_eq!(cfg.planner_max_seconds, 0.01);
}

#[test]
fn freeze_on_bad_signature() {
    let source = env(&[
        ("ADAAD6_CONFIG_SIG", "deadbeef"),
        ("ADAAD6_CONFIG_SIG_KEY", "dev-key"),
    ]);
    let effective = load_config(&source, &EnvKeyProvider).expect("load");
    assert_eq!(effective.freeze_reason(), Some(FreezeReason::ConfigSigInvalid));
}

#[test]
fn valid_signature_loads_operational() {
    let mut source = env(&[
        ("ADAAD6_CONFIG_SIG_REQUIRED", "true"),
        ("ADAAD6_CONFIG_SIG_KEY", "dev-key"),
        ("ADAAD6_VERSION", "1.2.3"),
    ]);
    let sig = sign_env_payload(b"dev-key", &source);
    source.insert("ADAAD6_CONFIG_SIG".to_string(), sig);

    let effective = load_config(&source, &EnvKeyProvider).expect("load");
    assert!(!effective.is_frozen());
    assert_eq!(effective.config().version, "1.2.3");
}

#[test]
fn signature_covers_every_non_sig_key() {
    let mut source = env(&[
        ("ADAAD6_CONFIG_SIG_REQUIRED", "true"),
        ("ADAAD6_CONFIG_SIG_KEY", "dev-key"),
        ("ADAAD6_PLANNER_MAX_STEPS", "5"),
    ]);
    let sig = sign_env_payload(b"dev-key", &source);
    source.insert("ADAAD6_CONFIG_SIG".to_string(), sig);
    // Tamper with a signed key after minting.
    source.insert("ADAAD6_PLANNER_MAX_STEPS".to_string(), "9999".to_string());

    let effective = load_config(&source, &EnvKeyProvider).expect("load");
    assert_eq!(effective.freeze_reason(), Some(FreezeReason::ConfigSigInvalid));
}

#[test]
fn wrong_algorithm_freezes() {
    let mut source = env(&[
        ("ADAAD6_CONFIG_SIG_KEY", "dev-key"),
        ("ADAAD6_CONFIG_SIG_ALG", "HMAC-MD5"),
    ]);
    let sig = sign_env_payload(b"dev-key", &source);
    source.insert("ADAAD6_CONFIG_SIG".to_string(), sig);

    let effective = load_config(&source, &EnvKeyProvider).expect("load");
    assert_eq!(effective.freeze_reason(), Some(FreezeReason::ConfigSigInvalid));
}

#[test]
fn missing_key_freezes_as_unavailable() {
    let source = env(&[("ADAAD6_CONFIG_SIG_REQUIRED", "true"), ("ADAAD6_CONFIG_SIG", "aa")]);
    let effective = load_config(&source, &StaticKeyProvider::new(Vec::new())).expect("load");
    assert_eq!(
        effective.freeze_reason(),
        Some(FreezeReason::ConfigSigKeyUnavailable)
    );
}

#[test]
fn schema_mismatch_freezes_even_when_sig_not_required() {
    let source = env(&[
        ("ADAAD6_CONFIG_SCHEMA_VERSION", "0"),
        ("ADAAD6_CONFIG_SIG_REQUIRED", "false"),
    ]);
    let effective = load_config(&source, &EnvKeyProvider).expect("load");
    assert_eq!(
        effective.freeze_reason(),
        Some(FreezeReason::ConfigSchemaVersionMismatch)
    );
    assert!(effective.config().emergency_halt);
}

#[test]
fn emergency_halt_dominates_signature_outcome() {
    let mut source = env(&[
        ("ADAAD6_EMERGENCY_HALT", "true"),
        ("ADAAD6_CONFIG_SIG_REQUIRED", "true"),
        ("ADAAD6_CONFIG_SIG_KEY", "dev-key"),
    ]);
    let sig = sign_env_payload(b"dev-key", &source);
    source.insert("ADAAD6_CONFIG_SIG".to_string(), sig);

    let effective = load_config(&source, &EnvKeyProvider).expect("load");
    assert_eq!(effective.freeze_reason(), Some(FreezeReason::EmergencyHalt));
    let cfg = effective.config();
    assert_eq!(cfg.mutation_policy, MutationPolicy::Locked);
    assert!(cfg.ledger_readonly);
    assert!(!cfg.agents_enabled);
}

#[test]
fn prod_mode_requires_external_provider() {
    let source = env(&[("ADAAD6_MODE", "prod")]);
    let effective = load_config(&source, &EnvKeyProvider).expect("load");
    assert_eq!(
        effective.freeze_reason(),
        Some(FreezeReason::ConfigSigKeyProviderRequired)
    );

    let effective = load_config(&source, &StaticKeyProvider::new(b"ops-key".to_vec()))
        .expect("load");
    assert!(!effective.is_frozen());
}

#[test]
fn evolutionary_without_readiness_sig_freezes() {
    let source = env(&[
        ("ADAAD6_MUTATION_POLICY", "evolutionary"),
        ("ADAAD6_CONFIG_SIG_KEY", "dev-key"),
    ]);
    let effective = load_config(&source, &EnvKeyProvider).expect("load");
    assert_eq!(
        effective.freeze_reason(),
        Some(FreezeReason::ReadinessGateSignatureMissing)
    );
}

#[test]
fn evolutionary_with_bad_readiness_sig_freezes() {
    let source = env(&[
        ("ADAAD6_MUTATION_POLICY", "evolutionary"),
        ("ADAAD6_READINESS_GATE_SIG", "deadbeef"),
        ("ADAAD6_CONFIG_SIG_KEY", "dev-key"),
    ]);
    let effective = load_config(&source, &EnvKeyProvider).expect("load");
    assert_eq!(
        effective.freeze_reason(),
        Some(FreezeReason::ReadinessGateSignatureInvalid)
    );
}

#[test]
fn evolutionary_with_valid_readiness_sig_is_operational() {
    let mut source = env(&[
        ("ADAAD6_MUTATION_POLICY", "evolutionary"),
        ("ADAAD6_RESOURCE_TIER", "server"),
        ("ADAAD6_CONFIG_SIG_KEY", "dev-key"),
    ]);
    let gate = sign_readiness_payload(b"dev-key", &source);
    source.insert("ADAAD6_READINESS_GATE_SIG".to_string(), gate);

    let effective = load_config(&source, &EnvKeyProvider).expect("load");
    assert!(!effective.is_frozen());
    let cfg = effective.config();
    assert_eq!(cfg.mutation_policy, MutationPolicy::Evolutionary);
    assert!(cfg.readiness_gate_ok);

    let (enforced, demoted) = enforce_readiness_gate(cfg);
    assert!(!demoted);
    assert_eq!(enforced.mutation_policy, MutationPolicy::Evolutionary);
}

#[test]
fn readiness_enforcement_demotes_unverified_configs() {
    let cfg = AdaadConfig {
        mutation_policy: MutationPolicy::Evolutionary,
        readiness_gate_sig: "deadbeef".to_string(),
        ..AdaadConfig::default()
    };
    let (enforced, demoted) = enforce_readiness_gate(&cfg);
    assert!(demoted);
    assert_eq!(enforced.mutation_policy, MutationPolicy::Locked);
    assert_eq!(
        enforced.freeze_reason,
        Some(FreezeReason::ReadinessGateSignatureInvalid)
    );
    // Demotion is not an emergency halt.
    assert!(!enforced.emergency_halt);
    assert!(enforced.agents_enabled);

    let blank = AdaadConfig {
        mutation_policy: MutationPolicy::Evolutionary,
        ..AdaadConfig::default()
    };
    let (enforced, _) = enforce_readiness_gate(&blank);
    assert_eq!(
        enforced.freeze_reason,
        Some(FreezeReason::ReadinessGateSignatureMissing)
    );
}

#[test]
fn ledger_file_env_aliases() {
    let effective = load_config(
        &env(&[("ADAAD6_LEDGER_FILENAME", "legacy.jsonl")]),
        &EnvKeyProvider,
    )
    .expect("load");
    assert_eq!(effective.config().ledger_filename, "legacy.jsonl");

    let effective = load_config(
        &env(&[("ADAAD6_LEDGER_FILE", "preferred.jsonl")]),
        &EnvKeyProvider,
    )
    .expect("load");
    assert_eq!(effective.config().ledger_filename, "preferred.jsonl");

    // Explicit LEDGER_FILENAME wins when both are set.
    let effective = load_config(
        &env(&[
            ("ADAAD6_LEDGER_FILE", "alias.jsonl"),
            ("ADAAD6_LEDGER_FILENAME", "explicit.jsonl"),
        ]),
        &EnvKeyProvider,
    )
    .expect("load");
    assert_eq!(effective.config().ledger_filename, "explicit.jsonl");
}

#[test]
fn ledger_schema_version_falls_back_to_log_version() {
    let effective = load_config(&env(&[("ADAAD6_LOG_SCHEMA_VERSION", "7")]), &EnvKeyProvider)
        .expect("load");
    assert_eq!(effective.config().ledger_schema_version, "7");

    let effective = load_config(
        &env(&[
            ("ADAAD6_LOG_SCHEMA_VERSION", "7"),
            ("ADAAD6_LEDGER_SCHEMA_VERSION", "9"),
        ]),
        &EnvKeyProvider,
    )
    .expect("load");
    assert_eq!(effective.config().ledger_schema_version, "9");
}

#[test]
fn resource_scaling_multiplies_time_budget() {
    let cases = [
        ("mobile", 2.0 * 2.5),
        ("edge", 2.0 * 1.5),
        ("server", 2.0),
    ];
    for (tier, expected) in cases {
        let effective = load_config(
            &env(&[
                ("ADAAD6_RESOURCE_TIER", tier),
                ("ADAAD6_PLANNER_MAX_SECONDS", "2.0"),
            ]),
            &EnvKeyProvider,
        )
        .expect("load");
        assert_eq!(effective.config().planner_max_seconds, expected, "tier {tier}");
    }
}

#[test]
fn derived_seconds_are_clamped() {
    let effective = load_config(
        &env(&[
            ("ADAAD6_RESOURCE_TIER", "mobile"),
            ("ADAAD6_PLANNER_MAX_SECONDS", "200"),
        ]),
        &EnvKeyProvider,
    )
    .expect("load");
    assert_eq!(effective.config().planner_max_seconds, 300.0);
}

#[test]
fn unknown_env_keys_are_rejected() {
    let err = load_config(&env(&[("ADAAD6_TURBO_MODE", "yes")]), &EnvKeyProvider)
        .expect_err("unknown key");
    assert!(matches!(err, ConfigError::UnknownKey { .. }));
}

#[test]
fn malformed_values_are_hard_errors() {
    for (key, value) in [
        ("ADAAD6_PLANNER_MAX_STEPS", "lots"),
        ("ADAAD6_PLANNER_MAX_SECONDS", "soon"),
        ("ADAAD6_LEDGER_ENABLED", "perhaps"),
        ("ADAAD6_MODE", "staging"),
        ("ADAAD6_RESOURCE_TIER", "cloud"),
        ("ADAAD6_MUTATION_POLICY", "wild"),
    ] {
        assert!(
            load_config(&env(&[(key, value)]), &EnvKeyProvider).is_err(),
            "expected hard error for {key}={value}"
        );
    }
}

#[test]
fn path_violations_fail_validation() {
    for bad in [
        "../events.jsonl",
        "/events.jsonl",
        "~/events.jsonl",
        "..\\events.jsonl",
        "C:\\events.jsonl",
        "   ",
    ] {
        let cfg = AdaadConfig {
            ledger_enabled: true,
            ledger_filename: bad.to_string(),
            ..AdaadConfig::default()
        };
        assert!(cfg.validate().is_err(), "expected rejection of {bad:?}");
    }
}

#[test]
fn validate_checks_planner_bounds() {
    let cfg = AdaadConfig {
        planner_max_steps: 0,
        ..AdaadConfig::default()
    };
    assert!(cfg.validate().is_err());

    let cfg = AdaadConfig {
        planner_max_seconds: 0.0,
        ..AdaadConfig::default()
    };
    assert!(cfg.validate().is_err());

    let cfg = AdaadConfig {
        planner_max_steps: 20_000,
        ..AdaadConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn resource_tier_values() {
    assert_eq!(ResourceTier::Mobile.scaling(), 2.5);
    assert_eq!(ResourceTier::Edge.scaling(), 1.5);
    assert_eq!(ResourceTier::Server.scaling(), 1.0);
}
