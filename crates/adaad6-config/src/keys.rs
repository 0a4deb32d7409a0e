//! Pluggable signing-key providers
//!
//! The config controller never owns secret material. Dev deployments may
//! read the key from the environment being loaded; prod deployments must
//! hand in an external provider or the load freezes with
//! `CONFIG_SIG_KEY_PROVIDER_REQUIRED`.

use std::collections::BTreeMap;

/// Source of the HMAC key used for the config signature and the readiness
/// gate.
pub trait SigningKeyProvider {
    /// Key material, or `None` when unavailable.
    fn signing_key(&self, env: &BTreeMap<String, String>) -> Option<Vec<u8>>;

    /// External providers hold key material outside the env under
    /// verification. Prod mode requires one.
    fn is_external(&self) -> bool {
        false
    }
}

/// Dev-mode fallback: reads `ADAAD6_CONFIG_SIG_KEY` from the env map under
/// load.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvKeyProvider;

impl SigningKeyProvider for EnvKeyProvider {
    fn signing_key(&self, env: &BTreeMap<String, String>) -> Option<Vec<u8>> {
        env.get("ADAAD6_CONFIG_SIG_KEY")
            .filter(|value| !value.trim().is_empty())
            .map(|value| value.as_bytes().to_vec())
    }
}

/// Externally supplied key material (secret manager, operator handoff).
#[derive(Clone)]
pub struct StaticKeyProvider {
    key: Vec<u8>,
}

impl StaticKeyProvider {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }
}

impl SigningKeyProvider for StaticKeyProvider {
    fn signing_key(&self, _env: &BTreeMap<String, String>) -> Option<Vec<u8>> {
        if self.key.is_empty() {
            None
        } else {
            Some(self.key.clone())
        }
    }

    fn is_external(&self) -> bool {
        true
    }
}
