//! ADAAD-6 Config - Signature-gated configuration with freeze dominance
//!
//! The config controller is the first trust decision the system makes.
//! Operator input arrives as `ADAAD6_*` environment entries, is verified
//! against an HMAC-SHA256 signature over the canonical env payload, and
//! produces an [`EffectiveConfig`]:
//!
//! - `Operational` permits agent and ledger-write operations
//! - `Frozen` locks mutation, disables agents, and forces the ledger
//!   read-only; the [`FreezeReason`] names the failure class
//!
//! `EMERGENCY_HALT=true` dominates every signature outcome.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod env;
pub mod keys;
pub mod paths;

pub use env::{
    canonical_env_payload, load_config, readiness_payload, sign_env_payload,
    sign_readiness_payload, ENV_PREFIX,
};
pub use keys::{EnvKeyProvider, SigningKeyProvider, StaticKeyProvider};
pub use paths::{resolve_under_home, validate_relative_component};

/// Compiled-in config schema version. A mismatching
/// `ADAAD6_CONFIG_SCHEMA_VERSION` freezes the run.
pub const CONFIG_SCHEMA_VERSION: &str = "1";

pub const PLANNER_MAX_STEPS_CEILING: u32 = 10_000;
pub const PLANNER_MIN_SECONDS: f64 = 0.01;
pub const PLANNER_MAX_SECONDS: f64 = 300.0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },

    #[error("unknown environment key: {key}")]
    UnknownKey { key: String },

    #[error("path violation for {field}: {reason}")]
    PathViolation { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Deployment mode. Prod mode refuses the env-fallback key provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Dev,
    Prod,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Dev => "dev",
            Mode::Prod => "prod",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationPolicy {
    Locked,
    Sandboxed,
    Evolutionary,
}

impl MutationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationPolicy::Locked => "LOCKED",
            MutationPolicy::Sandboxed => "SANDBOXED",
            MutationPolicy::Evolutionary => "EVOLUTIONARY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceTier {
    Mobile,
    Edge,
    Server,
}

impl ResourceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceTier::Mobile => "mobile",
            ResourceTier::Edge => "edge",
            ResourceTier::Server => "server",
        }
    }

    /// Time-budget multiplier. Mobile work is slower, not shorter, so the
    /// mobile tier multiplies the planner's wall clock.
    pub fn scaling(&self) -> f64 {
        match self {
            ResourceTier::Mobile => 2.5,
            ResourceTier::Edge => 1.5,
            ResourceTier::Server => 1.0,
        }
    }
}

/// Why a config was frozen. `EMERGENCY_HALT` dominates the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FreezeReason {
    EmergencyHalt,
    ConfigSchemaVersionMismatch,
    ConfigSigInvalid,
    ConfigSigKeyUnavailable,
    ConfigSigKeyProviderRequired,
    ReadinessGateSignatureMissing,
    ReadinessGateSignatureInvalid,
}

impl FreezeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FreezeReason::EmergencyHalt => "EMERGENCY_HALT",
            FreezeReason::ConfigSchemaVersionMismatch => "CONFIG_SCHEMA_VERSION_MISMATCH",
            FreezeReason::ConfigSigInvalid => "CONFIG_SIG_INVALID",
            FreezeReason::ConfigSigKeyUnavailable => "CONFIG_SIG_KEY_UNAVAILABLE",
            FreezeReason::ConfigSigKeyProviderRequired => "CONFIG_SIG_KEY_PROVIDER_REQUIRED",
            FreezeReason::ReadinessGateSignatureMissing => "READINESS_GATE_SIGNATURE_MISSING",
            FreezeReason::ReadinessGateSignatureInvalid => "READINESS_GATE_SIGNATURE_INVALID",
        }
    }
}

/// The effective configuration for a run.
///
/// All fields are plain data; once built the value is never mutated in
/// place. The freeze controller produces new copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaadConfig {
    pub version: String,
    pub mode: Mode,
    pub config_schema_version: String,
    /// Sandbox root. Every path the core touches resolves under it.
    pub home: String,
    pub actions_dir: String,
    pub log_path: String,
    pub log_schema_version: String,
    pub mutation_policy: MutationPolicy,
    pub readiness_gate_sig: String,
    /// Set by `load_config` when the readiness signature verified against
    /// the canonical env payload. Hand-built configs start unverified.
    pub readiness_gate_ok: bool,
    pub resource_tier: ResourceTier,
    pub planner_max_steps: u32,
    pub planner_max_seconds: f64,
    pub ledger_enabled: bool,
    pub ledger_dir: String,
    pub ledger_filename: String,
    pub ledger_schema_version: String,
    pub ledger_readonly: bool,
    pub agents_enabled: bool,
    pub emergency_halt: bool,
    pub freeze_reason: Option<FreezeReason>,
}

impl Default for AdaadConfig {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            mode: Mode::Dev,
            config_schema_version: CONFIG_SCHEMA_VERSION.to_string(),
            home: ".".to_string(),
            actions_dir: ".adaad/actions".to_string(),
            log_path: ".logs/adaad6.jsonl".to_string(),
            log_schema_version: "1".to_string(),
            mutation_policy: MutationPolicy::Locked,
            readiness_gate_sig: String::new(),
            readiness_gate_ok: false,
            resource_tier: ResourceTier::Mobile,
            planner_max_steps: 25,
            planner_max_seconds: 2.0,
            ledger_enabled: false,
            ledger_dir: ".adaad/ledger".to_string(),
            ledger_filename: "events.jsonl".to_string(),
            ledger_schema_version: "1".to_string(),
            ledger_readonly: false,
            agents_enabled: true,
            emergency_halt: false,
            freeze_reason: None,
        }
    }
}

impl AdaadConfig {
    /// Whether any mutation path may run at all.
    pub fn mutation_enabled(&self) -> bool {
        self.mutation_policy != MutationPolicy::Locked
    }

    pub fn resource_scaling(&self) -> f64 {
        self.resource_tier.scaling()
    }

    /// Check field invariants and path sandbox rules.
    pub fn validate(&self) -> Result<()> {
        if self.planner_max_steps < 1 || self.planner_max_steps > PLANNER_MAX_STEPS_CEILING {
            return Err(ConfigError::InvalidValue {
                field: "planner_max_steps",
                message: format!("must be in [1, {}]", PLANNER_MAX_STEPS_CEILING),
            });
        }
        if !self.planner_max_seconds.is_finite()
            || self.planner_max_seconds < PLANNER_MIN_SECONDS
            || self.planner_max_seconds > PLANNER_MAX_SECONDS
        {
            return Err(ConfigError::InvalidValue {
                field: "planner_max_seconds",
                message: format!("must be in [{}, {}]", PLANNER_MIN_SECONDS, PLANNER_MAX_SECONDS),
            });
        }
        if self.home.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "home",
                message: "must be set".to_string(),
            });
        }
        validate_relative_component(&self.actions_dir, "actions_dir")?;
        validate_relative_component(&self.log_path, "log_path")?;
        if self.ledger_enabled {
            if self.ledger_schema_version.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "ledger_schema_version",
                    message: "must be set when ledger is enabled".to_string(),
                });
            }
            validate_relative_component(&self.ledger_dir, "ledger_dir")?;
            validate_relative_component(&self.ledger_filename, "ledger_filename")?;
        }
        Ok(())
    }

    /// Return a frozen copy of this config.
    pub fn frozen(&self, reason: FreezeReason) -> AdaadConfig {
        AdaadConfig {
            emergency_halt: true,
            mutation_policy: MutationPolicy::Locked,
            ledger_enabled: true,
            ledger_readonly: true,
            agents_enabled: false,
            planner_max_steps: 1,
            planner_max_seconds: PLANNER_MIN_SECONDS,
            freeze_reason: Some(reason),
            ..self.clone()
        }
    }
}

/// A loaded configuration, split by whether agent and ledger-write
/// operations are permitted.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectiveConfig {
    Operational(AdaadConfig),
    Frozen(AdaadConfig, FreezeReason),
}

impl EffectiveConfig {
    pub fn config(&self) -> &AdaadConfig {
        match self {
            EffectiveConfig::Operational(cfg) => cfg,
            EffectiveConfig::Frozen(cfg, _) => cfg,
        }
    }

    pub fn into_config(self) -> AdaadConfig {
        match self {
            EffectiveConfig::Operational(cfg) => cfg,
            EffectiveConfig::Frozen(cfg, _) => cfg,
        }
    }

    pub fn is_frozen(&self) -> bool {
        matches!(self, EffectiveConfig::Frozen(..))
    }

    pub fn freeze_reason(&self) -> Option<FreezeReason> {
        match self {
            EffectiveConfig::Operational(_) => None,
            EffectiveConfig::Frozen(_, reason) => Some(*reason),
        }
    }
}

/// Downgrade an `EVOLUTIONARY` config whose readiness gate is unsatisfied.
///
/// Returns the enforced config and whether enforcement demoted it. The
/// demotion locks mutation and records the readiness freeze reason, but it
/// is not an emergency halt: agents stay enabled and the run proceeds with
/// mutation forbidden.
pub fn enforce_readiness_gate(cfg: &AdaadConfig) -> (AdaadConfig, bool) {
    if cfg.mutation_policy != MutationPolicy::Evolutionary {
        return (cfg.clone(), false);
    }
    if cfg.readiness_gate_ok {
        return (cfg.clone(), false);
    }
    let reason = if cfg.readiness_gate_sig.trim().is_empty() {
        FreezeReason::ReadinessGateSignatureMissing
    } else {
        FreezeReason::ReadinessGateSignatureInvalid
    };
    tracing::warn!(reason = reason.as_str(), "readiness gate unsatisfied; locking mutation");
    let mut enforced = cfg.clone();
    enforced.mutation_policy = MutationPolicy::Locked;
    enforced.freeze_reason = Some(reason);
    (enforced, true)
}

/// Process environment as a sorted map, for callers that load from the
/// real environment rather than a test fixture.
pub fn environment_snapshot() -> BTreeMap<String, String> {
    std::env::vars().collect()
}
