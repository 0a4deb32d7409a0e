//! Crash taxonomy
//!
//! Four fixed codes classify every kernel failure. The mapping from
//! ordinary errors to codes is deterministic, and debug traces never ride
//! along into serialized output.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrashCode {
    #[serde(rename = "CRASH_0x01")]
    IntegrityViolation,
    #[serde(rename = "CRASH_0x02")]
    EvidenceMissing,
    #[serde(rename = "CRASH_0x03")]
    DeterminismBreach,
    #[serde(rename = "CRASH_0x04")]
    UnloggedExecution,
}

impl CrashCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrashCode::IntegrityViolation => "CRASH_0x01",
            CrashCode::EvidenceMissing => "CRASH_0x02",
            CrashCode::DeterminismBreach => "CRASH_0x03",
            CrashCode::UnloggedExecution => "CRASH_0x04",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CrashCode::IntegrityViolation => "INTEGRITY_VIOLATION",
            CrashCode::EvidenceMissing => "EVIDENCE_MISSING",
            CrashCode::DeterminismBreach => "DETERMINISM_BREACH",
            CrashCode::UnloggedExecution => "UNLOGGED_EXECUTION",
        }
    }
}

/// A classified kernel failure.
///
/// `debug` holds a captured trace for internal inspection; it is excluded
/// from every serialized form.
#[derive(Error, Debug, Clone)]
#[error("{}: {detail}", .code.as_str())]
pub struct KernelCrash {
    pub code: CrashCode,
    pub detail: String,
    debug: Option<String>,
}

pub type Outcome<T> = std::result::Result<T, KernelCrash>;

impl KernelCrash {
    pub fn new(code: CrashCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
            debug: None,
        }
    }

    pub fn integrity(detail: impl Into<String>) -> Self {
        Self::new(CrashCode::IntegrityViolation, detail)
    }

    pub fn evidence(detail: impl Into<String>) -> Self {
        Self::new(CrashCode::EvidenceMissing, detail)
    }

    pub fn determinism(detail: impl Into<String>) -> Self {
        Self::new(CrashCode::DeterminismBreach, detail)
    }

    pub fn unlogged(detail: impl Into<String>) -> Self {
        Self::new(CrashCode::UnloggedExecution, detail)
    }

    /// Attach a debug trace unless one is already present.
    pub fn with_debug(mut self, debug: impl Into<String>) -> Self {
        if self.debug.is_none() {
            self.debug = Some(debug.into());
        }
        self
    }

    /// The captured trace, held separately from the serialized form.
    pub fn debug_detail(&self) -> Option<&str> {
        self.debug.as_deref()
    }
}

impl From<std::io::Error> for KernelCrash {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        let detail = err.to_string();
        match err.kind() {
            ErrorKind::NotFound => KernelCrash::evidence(detail),
            ErrorKind::PermissionDenied => KernelCrash::integrity(detail),
            ErrorKind::InvalidInput | ErrorKind::InvalidData => KernelCrash::integrity(detail),
            ErrorKind::TimedOut => KernelCrash::determinism(detail),
            _ => KernelCrash::determinism(detail),
        }
    }
}

impl From<serde_json::Error> for KernelCrash {
    fn from(err: serde_json::Error) -> Self {
        KernelCrash::integrity(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(CrashCode::IntegrityViolation.as_str(), "CRASH_0x01");
        assert_eq!(CrashCode::EvidenceMissing.as_str(), "CRASH_0x02");
        assert_eq!(CrashCode::DeterminismBreach.as_str(), "CRASH_0x03");
        assert_eq!(CrashCode::UnloggedExecution.as_str(), "CRASH_0x04");
    }

    #[test]
    fn io_errors_map_deterministically() {
        use std::io::{Error, ErrorKind};
        let crash = KernelCrash::from(Error::new(ErrorKind::NotFound, "gone"));
        assert_eq!(crash.code, CrashCode::EvidenceMissing);
        let crash = KernelCrash::from(Error::new(ErrorKind::PermissionDenied, "nope"));
        assert_eq!(crash.code, CrashCode::IntegrityViolation);
        let crash = KernelCrash::from(Error::new(ErrorKind::TimedOut, "hung"));
        assert_eq!(crash.code, CrashCode::DeterminismBreach);
        let crash = KernelCrash::from(Error::new(ErrorKind::BrokenPipe, "pipe"));
        assert_eq!(crash.code, CrashCode::DeterminismBreach);
    }

    #[test]
    fn display_carries_code_and_detail() {
        let crash = KernelCrash::evidence("Missing node for authority");
        assert_eq!(crash.to_string(), "CRASH_0x02: Missing node for authority");
    }

    #[test]
    fn debug_detail_is_separate() {
        let crash = KernelCrash::integrity("bad shape").with_debug("trace line 1");
        assert_eq!(crash.debug_detail(), Some("trace line 1"));
        // Display output never includes the trace.
        assert!(!crash.to_string().contains("trace line 1"));
    }
}
