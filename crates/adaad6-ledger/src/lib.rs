//! ADAAD-6 Ledger - Hash-chained append-only provenance log
//!
//! A single newline-delimited file of canonical-JSON events at
//! `home / ledger_dir / ledger_filename`. Every event carries
//! `prev_hash` (null at genesis) and `hash` over its own body, so any
//! reordering or edit is detectable with [`verify_chain`].
//!
//! # Invariants
//!
//! 1. Append-only; read-only ledgers reject every append
//! 2. One in-flight writer: the append takes an exclusive file lock
//!    covering read-last-line plus write
//! 3. Byte-level canonicality: consumers must not re-encode events

use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::PathBuf;

use adaad6_config::{resolve_under_home, AdaadConfig, ConfigError};
use adaad6_crypto::canon::canonical_json;
use chrono::{SecondsFormat, Utc};
use fs2::FileExt;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

pub mod hashchain;

pub use hashchain::{compute_event_hash, verify_chain};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ledger is disabled")]
    Disabled,

    #[error("LEDGER_READONLY")]
    ReadOnly,

    #[error("ledger path {path} is a directory, expected a file")]
    PathIsDirectory { path: String },

    #[error("ledger corrupt at line {line}: {message}")]
    Corrupt { line: usize, message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("ledger io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// RFC 3339 UTC timestamp with a trailing `Z` and second precision, the
/// only timestamp format ledger events carry.
pub fn utc_now_iso_z() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Resolve the ledger file path under the sandbox root.
pub fn ledger_path(cfg: &AdaadConfig) -> Result<PathBuf> {
    let joined = format!("{}/{}", cfg.ledger_dir.trim(), cfg.ledger_filename.trim());
    Ok(resolve_under_home(
        std::path::Path::new(&cfg.home),
        &joined,
        "ledger_path",
    )?)
}

/// Create parent directories and touch the ledger file.
pub fn ensure_ledger(cfg: &AdaadConfig) -> Result<PathBuf> {
    if !cfg.ledger_enabled {
        return Err(LedgerError::Disabled);
    }
    if cfg.ledger_dir.trim().is_empty() || cfg.ledger_filename.trim().is_empty() {
        return Err(LedgerError::Config(ConfigError::InvalidValue {
            field: "ledger_dir",
            message: "ledger directory and file must be set when ledger is enabled".to_string(),
        }));
    }
    let path = ledger_path(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if path.is_dir() {
        return Err(LedgerError::PathIsDirectory {
            path: path.display().to_string(),
        });
    }
    OpenOptions::new().create(true).append(true).open(&path)?;
    Ok(path)
}

fn last_hash(contents: &str) -> Result<Option<String>> {
    let Some((line_no, line)) = contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .last()
    else {
        return Ok(None);
    };
    let event: Value = serde_json::from_str(line).map_err(|e| LedgerError::Corrupt {
        line: line_no + 1,
        message: e.to_string(),
    })?;
    Ok(event.get("hash").and_then(Value::as_str).map(str::to_string))
}

/// Append an event to the ledger and return it.
///
/// The exclusive lock spans the read of the last line and the write of the
/// new line, so a single in-flight writer observes a consistent chain even
/// across processes.
pub fn append_event(
    cfg: &AdaadConfig,
    event_type: &str,
    payload: Map<String, Value>,
    ts: &str,
    actor: &str,
) -> Result<Value> {
    if cfg.ledger_readonly {
        return Err(LedgerError::ReadOnly);
    }
    let path = ensure_ledger(cfg)?;

    let mut file = OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(&path)?;
    file.lock_exclusive()?;
    let result = append_locked(cfg, &mut file, event_type, payload, ts, actor);
    let _ = fs2::FileExt::unlock(&file);
    result
}

fn append_locked(
    cfg: &AdaadConfig,
    file: &mut std::fs::File,
    event_type: &str,
    payload: Map<String, Value>,
    ts: &str,
    actor: &str,
) -> Result<Value> {
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    let prev_hash = last_hash(&contents)?;

    let mut event = Map::new();
    event.insert(
        "schema_version".to_string(),
        Value::String(cfg.ledger_schema_version.clone()),
    );
    event.insert(
        "event_id".to_string(),
        Value::String(Uuid::new_v4().to_string()),
    );
    event.insert("ts".to_string(), Value::String(ts.to_string()));
    event.insert("actor".to_string(), Value::String(actor.to_string()));
    event.insert("type".to_string(), Value::String(event_type.to_string()));
    event.insert("payload".to_string(), Value::Object(payload));
    event.insert(
        "prev_hash".to_string(),
        prev_hash.map(Value::String).unwrap_or(Value::Null),
    );

    let hash = compute_event_hash(&Value::Object(event.clone()));
    event.insert("hash".to_string(), Value::String(hash));
    let event = Value::Object(event);

    let mut line = canonical_json(&event);
    line.push('\n');
    file.write_all(line.as_bytes())?;
    file.flush()?;

    tracing::debug!(event_type, actor, "ledger event appended");
    Ok(event)
}

/// Read every event, optionally retaining only the last `limit`.
///
/// A missing file is not an error and reads as empty; a line that fails to
/// parse is fatal.
pub fn read_events(cfg: &AdaadConfig, limit: Option<usize>) -> Result<Vec<Value>> {
    if !cfg.ledger_enabled {
        return Err(LedgerError::Disabled);
    }
    let path = ledger_path(cfg)?;
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut events = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let event: Value = serde_json::from_str(line).map_err(|e| LedgerError::Corrupt {
            line: line_no + 1,
            message: e.to_string(),
        })?;
        events.push(event);
    }
    if let Some(limit) = limit {
        let skip = events.len().saturating_sub(limit);
        events.drain(..skip);
    }
    Ok(events)
}
