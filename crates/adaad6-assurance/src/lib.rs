//! ADAAD-6 Assurance - Operational log and doctor diagnostics
//!
//! Everything here is observability around the core, never part of an
//! outcome: best-effort callers (the CLI log hook in particular) must not
//! let a logging failure influence the operation they are reporting on.

pub mod doctor;
pub mod logging;

pub use doctor::{run_doctor, write_latest_report, DoctorReport, DOCTOR_REPORT_RELATIVE_PATH};
pub use logging::{append_jsonl_log_event, build_log_event, compute_checksum, LogEvent};

use adaad6_config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssuranceError {
    #[error("log path {path} is a directory, expected a file")]
    PathIsDirectory { path: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("assurance io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("assurance serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AssuranceError>;
