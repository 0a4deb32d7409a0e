//! Immutable run context
//!
//! A context is built once per run and only ever extended by returning a
//! new value. Its serialized form goes into ledger payloads verbatim.

use std::path::{Path, PathBuf};

use adaad6_config::{resolve_under_home, AdaadConfig, ConfigError};
use adaad6_crypto::canon::to_canonical_value;
use adaad6_crypto::hash::hash_object;
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("artifact name must be set")]
    ArtifactNameMissing,

    #[error("artifact uri must be set")]
    ArtifactUriMissing,

    #[error("artifact {name} already registered")]
    DuplicateArtifact { name: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("config snapshot failed: {0}")]
    Snapshot(String),
}

/// Absolute workspace paths, each proven to live under `home`.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspacePaths {
    pub home: PathBuf,
    pub actions_dir: PathBuf,
    pub log_path: PathBuf,
    pub ledger_path: Option<PathBuf>,
}

impl WorkspacePaths {
    pub fn from_config(cfg: &AdaadConfig) -> Result<Self, ContextError> {
        let home = absolute_home(&cfg.home);
        let actions_dir = resolve_under_home(&home, &cfg.actions_dir, "actions_dir")?;
        let log_path = resolve_under_home(&home, &cfg.log_path, "log_path")?;

        let ledger_path = if cfg.ledger_enabled && !cfg.ledger_filename.trim().is_empty() {
            let joined = format!("{}/{}", cfg.ledger_dir.trim(), cfg.ledger_filename.trim());
            Some(resolve_under_home(&home, &joined, "ledger_path")?)
        } else {
            None
        };

        Ok(Self {
            home,
            actions_dir,
            log_path,
            ledger_path,
        })
    }

    pub fn to_value(&self) -> Value {
        json!({
            "home": self.home.display().to_string(),
            "actions_dir": self.actions_dir.display().to_string(),
            "log_path": self.log_path.display().to_string(),
            "ledger_path": self.ledger_path.as_ref().map(|p| p.display().to_string()),
        })
    }
}

fn absolute_home(raw: &str) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Canonical form and content hash of the effective config.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSnapshot {
    pub values: Value,
    pub hash: String,
}

impl ConfigSnapshot {
    pub fn from_config(cfg: &AdaadConfig) -> Result<Self, ContextError> {
        let values = to_canonical_value(cfg).map_err(|e| ContextError::Snapshot(e.to_string()))?;
        let hash = hash_object(&values);
        Ok(Self { values, hash })
    }

    pub fn to_value(&self) -> Value {
        json!({"values": self.values, "hash": self.hash})
    }
}

/// Ordered name → URI registry. Registration returns a new registry;
/// duplicate names are rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactRegistry {
    artifacts: Vec<(String, String)>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str, uri: &str) -> Result<Self, ContextError> {
        if name.trim().is_empty() {
            return Err(ContextError::ArtifactNameMissing);
        }
        if uri.trim().is_empty() {
            return Err(ContextError::ArtifactUriMissing);
        }
        if self.artifacts.iter().any(|(existing, _)| existing == name) {
            return Err(ContextError::DuplicateArtifact {
                name: name.to_string(),
            });
        }
        let mut artifacts = self.artifacts.clone();
        artifacts.push((name.to_string(), uri.to_string()));
        Ok(Self { artifacts })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.artifacts
            .iter()
            .map(|(name, uri)| (name.as_str(), uri.as_str()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.artifacts.iter().any(|(existing, _)| existing == name)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn to_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (name, uri) in &self.artifacts {
            map.insert(name.clone(), Value::String(uri.clone()));
        }
        Value::Object(map)
    }
}

/// Immutable per-run context: sandboxed paths, run id, config snapshot and
/// the artifact registry.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelContext {
    pub workspace: WorkspacePaths,
    pub run_id: String,
    pub config: ConfigSnapshot,
    pub artifacts: ArtifactRegistry,
}

impl KernelContext {
    pub fn build(cfg: &AdaadConfig) -> Result<Self, ContextError> {
        Self::build_with_run_id(cfg, Uuid::new_v4().simple().to_string())
    }

    pub fn build_with_run_id(cfg: &AdaadConfig, run_id: impl Into<String>) -> Result<Self, ContextError> {
        Ok(Self {
            workspace: WorkspacePaths::from_config(cfg)?,
            run_id: run_id.into(),
            config: ConfigSnapshot::from_config(cfg)?,
            artifacts: ArtifactRegistry::new(),
        })
    }

    /// Extend the context with one more artifact, returning a new context.
    pub fn register_artifact(&self, name: &str, uri: &str) -> Result<Self, ContextError> {
        Ok(Self {
            workspace: self.workspace.clone(),
            run_id: self.run_id.clone(),
            config: self.config.clone(),
            artifacts: self.artifacts.register(name, uri)?,
        })
    }

    pub fn to_value(&self) -> Value {
        json!({
            "workspace": self.workspace.to_value(),
            "run_id": self.run_id,
            "config": self.config.to_value(),
            "artifacts": self.artifacts.to_value(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg_in(home: &Path) -> AdaadConfig {
        AdaadConfig {
            home: home.display().to_string(),
            ledger_enabled: true,
            ..AdaadConfig::default()
        }
    }

    #[test]
    fn context_carries_fresh_run_id_and_config_hash() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cfg = cfg_in(tmp.path());
        let a = KernelContext::build(&cfg).expect("build");
        let b = KernelContext::build(&cfg).expect("build");
        assert_ne!(a.run_id, b.run_id);
        assert_eq!(a.config.hash, b.config.hash);
        assert_eq!(a.config.hash.len(), 64);
    }

    #[test]
    fn workspace_paths_resolve_under_home() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cfg = cfg_in(tmp.path());
        let paths = WorkspacePaths::from_config(&cfg).expect("paths");
        assert!(paths.actions_dir.starts_with(&paths.home));
        assert!(paths.log_path.starts_with(&paths.home));
        assert!(paths.ledger_path.expect("ledger path").starts_with(&paths.home));
    }

    #[test]
    fn escaping_paths_are_rejected() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cfg = AdaadConfig {
            home: tmp.path().display().to_string(),
            log_path: "../outside.jsonl".to_string(),
            ..AdaadConfig::default()
        };
        assert!(WorkspacePaths::from_config(&cfg).is_err());
    }

    #[test]
    fn artifact_registry_is_append_only_and_unique() {
        let registry = ArtifactRegistry::new();
        let registry = registry.register("a", "data:application/json,1").expect("register");
        let grown = registry.register("b", "data:application/json,2").expect("register");
        assert_eq!(registry.len(), 1);
        assert_eq!(grown.len(), 2);

        assert!(matches!(
            grown.register("a", "data:application/json,3"),
            Err(ContextError::DuplicateArtifact { .. })
        ));
        assert!(grown.register("", "uri").is_err());
        assert!(grown.register("c", "  ").is_err());
    }

    #[test]
    fn register_artifact_returns_new_context() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cfg = cfg_in(tmp.path());
        let ctx = KernelContext::build(&cfg).expect("build");
        let extended = ctx.register_artifact("step:result", "data:application/json,{}").expect("register");
        assert!(ctx.artifacts.is_empty());
        assert!(extended.artifacts.contains("step:result"));
        assert_eq!(ctx.run_id, extended.run_id);
    }

    #[test]
    fn serialized_context_is_ledger_ready() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cfg = cfg_in(tmp.path());
        let ctx = KernelContext::build(&cfg).expect("build");
        let value = ctx.to_value();
        assert_eq!(value["run_id"], serde_json::json!(ctx.run_id));
        assert_eq!(value["config"]["hash"], serde_json::json!(ctx.config.hash));
        assert!(value["workspace"]["home"].is_string());
        assert!(value["artifacts"].is_object());
    }
}
