//! Environment parsing and the freeze decision
//!
//! `load_config` never panics and never returns a half-trusted config:
//! malformed values and unknown keys are hard errors, while trust failures
//! (signature, schema, key provider) freeze the run with a recorded
//! [`FreezeReason`].

use std::collections::BTreeMap;

use adaad6_crypto::mac::{hmac_sha256_hex, verify_hmac_sha256_hex, MAC_ALGORITHM};

use crate::keys::SigningKeyProvider;
use crate::{
    AdaadConfig, ConfigError, EffectiveConfig, FreezeReason, Mode, MutationPolicy, ResourceTier,
    Result, CONFIG_SCHEMA_VERSION, PLANNER_MAX_SECONDS, PLANNER_MIN_SECONDS,
};

pub const ENV_PREFIX: &str = "ADAAD6_";

/// Keys excluded from the canonical payload: the signature triple signs the
/// rest, it cannot sign itself.
const SIGNATURE_KEYS: [&str; 3] = [
    "ADAAD6_CONFIG_SIG",
    "ADAAD6_CONFIG_SIG_ALG",
    "ADAAD6_CONFIG_SIG_KEY",
];

const KNOWN_KEYS: [&str; 24] = [
    "VERSION",
    "MODE",
    "CONFIG_SCHEMA_VERSION",
    "HOME",
    "ACTIONS_DIR",
    "LOG_PATH",
    "LOG_SCHEMA_VERSION",
    "MUTATION_POLICY",
    "READINESS_GATE_SIG",
    "PLANNER_MAX_STEPS",
    "PLANNER_MAX_SECONDS",
    "RESOURCE_TIER",
    "LEDGER_ENABLED",
    "LEDGER_DIR",
    "LEDGER_FILE",
    "LEDGER_FILENAME",
    "LEDGER_SCHEMA_VERSION",
    "LEDGER_READONLY",
    "AGENTS_ENABLED",
    "EMERGENCY_HALT",
    "CONFIG_SIG_REQUIRED",
    "CONFIG_SIG_ALG",
    "CONFIG_SIG",
    "CONFIG_SIG_KEY",
];

/// Canonical env payload: every `ADAAD6_*` entry except the signature
/// triple, sorted ascending by key, encoded as `KEY=VALUE\n`.
pub fn canonical_env_payload(env: &BTreeMap<String, String>) -> String {
    let mut payload = String::new();
    for (key, value) in env {
        if !key.starts_with(ENV_PREFIX) || SIGNATURE_KEYS.contains(&key.as_str()) {
            continue;
        }
        payload.push_str(key);
        payload.push('=');
        payload.push_str(value);
        payload.push('\n');
    }
    payload
}

/// Sign the canonical payload for an env map. Operator tooling uses this to
/// mint `ADAAD6_CONFIG_SIG` values.
pub fn sign_env_payload(key: &[u8], env: &BTreeMap<String, String>) -> String {
    hmac_sha256_hex(key, canonical_env_payload(env).as_bytes())
}

/// Canonical payload for the readiness gate: the readiness signature cannot
/// sign itself, so its own entry is excluded. Mint the signature over an
/// env without `ADAAD6_READINESS_GATE_SIG`, then add it.
pub fn readiness_payload(env: &BTreeMap<String, String>) -> String {
    let mut without_sig = env.clone();
    without_sig.remove("ADAAD6_READINESS_GATE_SIG");
    canonical_env_payload(&without_sig)
}

/// Sign the readiness payload for an env map, for minting
/// `ADAAD6_READINESS_GATE_SIG`.
pub fn sign_readiness_payload(key: &[u8], env: &BTreeMap<String, String>) -> String {
    hmac_sha256_hex(key, readiness_payload(env).as_bytes())
}

fn get(env: &BTreeMap<String, String>, key: &str) -> Option<String> {
    env.get(&format!("{ENV_PREFIX}{key}")).cloned()
}

fn coerce_bool(raw: &str, field: &'static str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            field,
            message: format!("invalid boolean: {other}"),
        }),
    }
}

fn coerce_u32(raw: &str, field: &'static str) -> Result<u32> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field,
        message: format!("invalid integer: {raw}"),
    })
}

fn coerce_f64(raw: &str, field: &'static str) -> Result<f64> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field,
        message: format!("invalid float: {raw}"),
    })
}

fn coerce_mode(raw: &str) -> Result<Mode> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "dev" => Ok(Mode::Dev),
        "prod" => Ok(Mode::Prod),
        other => Err(ConfigError::InvalidValue {
            field: "mode",
            message: format!("must be dev or prod, got {other}"),
        }),
    }
}

fn coerce_policy(raw: &str) -> Result<MutationPolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "locked" => Ok(MutationPolicy::Locked),
        "sandboxed" => Ok(MutationPolicy::Sandboxed),
        "evolutionary" => Ok(MutationPolicy::Evolutionary),
        other => Err(ConfigError::InvalidValue {
            field: "mutation_policy",
            message: format!("must be locked, sandboxed or evolutionary, got {other}"),
        }),
    }
}

fn coerce_tier(raw: &str) -> Result<ResourceTier> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "mobile" => Ok(ResourceTier::Mobile),
        "edge" => Ok(ResourceTier::Edge),
        "server" => Ok(ResourceTier::Server),
        other => Err(ConfigError::InvalidValue {
            field: "resource_tier",
            message: format!("must be mobile, edge or server, got {other}"),
        }),
    }
}

fn reject_unknown_keys(env: &BTreeMap<String, String>) -> Result<()> {
    for key in env.keys() {
        if let Some(suffix) = key.strip_prefix(ENV_PREFIX) {
            if !KNOWN_KEYS.contains(&suffix) {
                return Err(ConfigError::UnknownKey { key: key.clone() });
            }
        }
    }
    Ok(())
}

/// Load and verify a configuration from an environment map.
///
/// Malformed values are hard errors. Trust failures freeze: the returned
/// config has `emergency_halt=true`, mutation locked, agents disabled, the
/// ledger read-only, and `freeze_reason` set to the failure class.
/// `ADAAD6_EMERGENCY_HALT=true` freezes regardless of signature outcome.
pub fn load_config(
    env: &BTreeMap<String, String>,
    provider: &dyn SigningKeyProvider,
) -> Result<EffectiveConfig> {
    reject_unknown_keys(env)?;

    let defaults = AdaadConfig::default();
    let mode = match get(env, "MODE") {
        Some(raw) => coerce_mode(&raw)?,
        None => defaults.mode,
    };
    let mutation_policy = match get(env, "MUTATION_POLICY") {
        Some(raw) => coerce_policy(&raw)?,
        None => defaults.mutation_policy,
    };
    let resource_tier = match get(env, "RESOURCE_TIER") {
        Some(raw) => coerce_tier(&raw)?,
        None => defaults.resource_tier,
    };
    let planner_max_steps = match get(env, "PLANNER_MAX_STEPS") {
        Some(raw) => coerce_u32(&raw, "planner_max_steps")?,
        None => defaults.planner_max_steps,
    };
    let raw_seconds = match get(env, "PLANNER_MAX_SECONDS") {
        Some(raw) => coerce_f64(&raw, "planner_max_seconds")?,
        None => defaults.planner_max_seconds,
    };
    // Mobile multiplies the time budget: mobile work is slower, not shorter.
    let planner_max_seconds =
        (raw_seconds * resource_tier.scaling()).clamp(PLANNER_MIN_SECONDS, PLANNER_MAX_SECONDS);

    let log_schema_version =
        get(env, "LOG_SCHEMA_VERSION").unwrap_or_else(|| defaults.log_schema_version.clone());
    // Explicit LEDGER_FILENAME wins over the LEDGER_FILE alias.
    let ledger_filename = get(env, "LEDGER_FILENAME")
        .or_else(|| get(env, "LEDGER_FILE"))
        .unwrap_or_else(|| defaults.ledger_filename.clone());
    let ledger_schema_version = get(env, "LEDGER_SCHEMA_VERSION")
        .unwrap_or_else(|| log_schema_version.clone());

    let emergency_halt = match get(env, "EMERGENCY_HALT") {
        Some(raw) => coerce_bool(&raw, "emergency_halt")?,
        None => false,
    };
    let sig_required = match get(env, "CONFIG_SIG_REQUIRED") {
        Some(raw) => coerce_bool(&raw, "config_sig_required")?,
        None => false,
    };

    let mut cfg = AdaadConfig {
        version: get(env, "VERSION").unwrap_or_else(|| defaults.version.clone()),
        mode,
        config_schema_version: get(env, "CONFIG_SCHEMA_VERSION")
            .unwrap_or_else(|| CONFIG_SCHEMA_VERSION.to_string()),
        home: get(env, "HOME").unwrap_or_else(|| defaults.home.clone()),
        actions_dir: get(env, "ACTIONS_DIR").unwrap_or_else(|| defaults.actions_dir.clone()),
        log_path: get(env, "LOG_PATH").unwrap_or_else(|| defaults.log_path.clone()),
        log_schema_version,
        mutation_policy,
        readiness_gate_sig: get(env, "READINESS_GATE_SIG").unwrap_or_default(),
        readiness_gate_ok: false,
        resource_tier,
        planner_max_steps,
        planner_max_seconds,
        ledger_enabled: match get(env, "LEDGER_ENABLED") {
            Some(raw) => coerce_bool(&raw, "ledger_enabled")?,
            None => defaults.ledger_enabled,
        },
        ledger_dir: get(env, "LEDGER_DIR").unwrap_or_else(|| defaults.ledger_dir.clone()),
        ledger_filename,
        ledger_schema_version,
        ledger_readonly: match get(env, "LEDGER_READONLY") {
            Some(raw) => coerce_bool(&raw, "ledger_readonly")?,
            None => defaults.ledger_readonly,
        },
        agents_enabled: match get(env, "AGENTS_ENABLED") {
            Some(raw) => coerce_bool(&raw, "agents_enabled")?,
            None => defaults.agents_enabled,
        },
        emergency_halt: false,
        freeze_reason: None,
    };

    let freeze = freeze_decision(env, provider, &mut cfg, emergency_halt, sig_required);
    let effective = match freeze {
        Some(reason) => {
            tracing::warn!(reason = reason.as_str(), "configuration frozen");
            let frozen = cfg.frozen(reason);
            frozen.validate()?;
            EffectiveConfig::Frozen(frozen, reason)
        }
        None => {
            cfg.validate()?;
            EffectiveConfig::Operational(cfg)
        }
    };
    Ok(effective)
}

fn freeze_decision(
    env: &BTreeMap<String, String>,
    provider: &dyn SigningKeyProvider,
    cfg: &mut AdaadConfig,
    emergency_halt: bool,
    sig_required: bool,
) -> Option<FreezeReason> {
    // Operator halt dominates every signature outcome.
    if emergency_halt {
        return Some(FreezeReason::EmergencyHalt);
    }
    if cfg.config_schema_version != CONFIG_SCHEMA_VERSION {
        return Some(FreezeReason::ConfigSchemaVersionMismatch);
    }
    if cfg.mode == Mode::Prod && !provider.is_external() {
        return Some(FreezeReason::ConfigSigKeyProviderRequired);
    }

    let signature = get(env, "CONFIG_SIG");
    let payload = canonical_env_payload(env);

    if sig_required || signature.is_some() {
        let alg = get(env, "CONFIG_SIG_ALG").unwrap_or_else(|| MAC_ALGORITHM.to_string());
        if alg != MAC_ALGORITHM {
            return Some(FreezeReason::ConfigSigInvalid);
        }
        let Some(signature) = signature else {
            return Some(FreezeReason::ConfigSigInvalid);
        };
        let Some(key) = provider.signing_key(env) else {
            return Some(FreezeReason::ConfigSigKeyUnavailable);
        };
        if !verify_hmac_sha256_hex(&key, payload.as_bytes(), &signature) {
            return Some(FreezeReason::ConfigSigInvalid);
        }
    }

    if cfg.mutation_policy == MutationPolicy::Evolutionary {
        if cfg.readiness_gate_sig.trim().is_empty() {
            return Some(FreezeReason::ReadinessGateSignatureMissing);
        }
        let Some(key) = provider.signing_key(env) else {
            return Some(FreezeReason::ConfigSigKeyUnavailable);
        };
        let gate_payload = readiness_payload(env);
        if !verify_hmac_sha256_hex(&key, gate_payload.as_bytes(), &cfg.readiness_gate_sig) {
            return Some(FreezeReason::ReadinessGateSignatureInvalid);
        }
        cfg.readiness_gate_ok = true;
    }

    None
}
