//! Typed action registry
//!
//! An action is any collaborator implementing the three-stage triple. The
//! catalog keys actions by lowercase name, registers built-ins first in a
//! deterministic order, and rejects duplicates. The discovery directory is
//! still sandbox-validated even though code is never loaded from it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use adaad6_config::{resolve_under_home, AdaadConfig, ConfigError};
use adaad6_kernel::Outcome;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("invalid action name: {name}")]
    InvalidName { name: String },

    #[error("duplicate action name: {name}")]
    DuplicateAction { name: String },

    #[error("actions_dir must not be a symlink")]
    SymlinkedActionsDir,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// The three-stage action contract consumed by the executor.
pub trait Action: Send + Sync {
    /// Shape-check raw params against the config; returns the validated
    /// input handed to `run`.
    fn validate(&self, params: &Map<String, Value>, cfg: &AdaadConfig) -> Outcome<Value>;

    /// Perform the action.
    fn run(&self, validated: Value) -> Outcome<Value>;

    /// Check the result against the action's contract.
    fn postcheck(&self, result: Value, cfg: &AdaadConfig) -> Outcome<Value>;
}

/// Name-keyed catalog of actions.
#[derive(Clone, Default)]
pub struct ActionCatalog {
    actions: BTreeMap<String, Arc<dyn Action>>,
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'))
}

impl ActionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action under a lowercase name. Duplicates fail.
    pub fn register(
        &mut self,
        name: &str,
        action: Arc<dyn Action>,
    ) -> Result<(), RegistryError> {
        if !valid_name(name) {
            return Err(RegistryError::InvalidName {
                name: name.to_string(),
            });
        }
        if self.actions.contains_key(name) {
            return Err(RegistryError::DuplicateAction {
                name: name.to_string(),
            });
        }
        self.actions.insert(name.to_string(), action);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.actions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Keep only actions whose name satisfies the predicate. Archetype
    /// filters use this; the predicate must be pure.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.actions.retain(|name, _| keep(name));
    }
}

impl std::fmt::Debug for ActionCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionCatalog")
            .field("names", &self.names())
            .finish()
    }
}

/// Resolve and sandbox-check the configured actions directory. The
/// directory may be absent; it must never be (or traverse) a symlink.
pub fn ensure_actions_dir(cfg: &AdaadConfig) -> Result<PathBuf, RegistryError> {
    let resolved = resolve_under_home(Path::new(&cfg.home), &cfg.actions_dir, "actions_dir")?;
    if let Ok(meta) = std::fs::symlink_metadata(&resolved) {
        if meta.file_type().is_symlink() {
            return Err(RegistryError::SymlinkedActionsDir);
        }
    }
    Ok(resolved)
}
