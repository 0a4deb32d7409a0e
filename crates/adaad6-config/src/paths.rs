//! Path sandbox rules
//!
//! Every path the core consumes must stay strictly under `cfg.home`:
//! relative, no `..`, no `~` prefix, no symlinked component.

use std::path::{Component, Path, PathBuf};

use crate::{ConfigError, Result};

/// Validate a raw configured path component before it is ever joined.
pub fn validate_relative_component(raw: &str, field: &str) -> Result<()> {
    let violation = |reason: &str| ConfigError::PathViolation {
        field: field.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(violation("must be set"));
    }
    if trimmed.starts_with('~') {
        return Err(violation("must not begin with ~"));
    }
    if trimmed.contains('\\') {
        return Err(violation("must not contain backslashes"));
    }
    if trimmed.contains(':') {
        return Err(violation("must not contain drive or scheme separators"));
    }
    let path = Path::new(trimmed);
    if path.is_absolute() {
        return Err(violation("must be relative"));
    }
    for component in path.components() {
        match component {
            Component::ParentDir => return Err(violation("must not contain ..")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(violation("must be relative"));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }
    Ok(())
}

/// Join a configured path under `home` and verify it does not traverse a
/// symlinked component. Missing components are allowed; existing ones must
/// be plain directories or files.
pub fn resolve_under_home(home: &Path, raw: &str, field: &str) -> Result<PathBuf> {
    validate_relative_component(raw, field)?;
    let mut probe = home.to_path_buf();
    for component in Path::new(raw.trim()).components() {
        if let Component::Normal(part) = component {
            probe.push(part);
            if let Ok(meta) = std::fs::symlink_metadata(&probe) {
                if meta.file_type().is_symlink() {
                    return Err(ConfigError::PathViolation {
                        field: field.to_string(),
                        reason: "must not traverse symlinks under home".to_string(),
                    });
                }
            }
        }
    }
    Ok(probe)
}
