//! Structural health checks
//!
//! Boot-time probes over the workspace: the sandbox root must exist and
//! every configured path must resolve under it.

use std::path::Path;

use adaad6_config::{resolve_under_home, AdaadConfig};
use serde_json::{json, Map, Value};

/// Per-probe detail map; every entry is a boolean.
pub fn check_structure_details(cfg: &AdaadConfig) -> Map<String, Value> {
    let home = Path::new(&cfg.home);
    let home_ok = home.is_dir();
    let actions_ok = resolve_under_home(home, &cfg.actions_dir, "actions_dir").is_ok();
    let log_ok = resolve_under_home(home, &cfg.log_path, "log_path").is_ok();
    let ledger_ok = if cfg.ledger_enabled {
        let joined = format!("{}/{}", cfg.ledger_dir.trim(), cfg.ledger_filename.trim());
        resolve_under_home(home, &joined, "ledger_path").is_ok()
    } else {
        true
    };

    let mut details = Map::new();
    details.insert("home".to_string(), json!(home_ok));
    details.insert("actions_dir".to_string(), json!(actions_ok));
    details.insert("log_path".to_string(), json!(log_ok));
    details.insert("ledger_dirs".to_string(), json!(ledger_ok));
    details
}

/// Overall verdict for the structure probes.
pub fn check_structure(cfg: &AdaadConfig) -> bool {
    check_structure_details(cfg)
        .values()
        .all(|v| v.as_bool().unwrap_or(false))
}
