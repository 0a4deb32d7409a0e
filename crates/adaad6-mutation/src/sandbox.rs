//! Isolated execution of candidate sources
//!
//! The candidate runs in a fresh OS process. The worker applies a
//! CPU-seconds cap and a 128 MiB address-space cap to itself at startup,
//! before it reads or interprets the script, then sends one
//! length-prefixed JSON message back on stdout; the parent joins with a
//! timeout and kills on expiry.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use serde_json::Value;

/// Address-space cap for the worker.
pub const SANDBOX_MEMORY_BYTES: u64 = 128 * 1024 * 1024;

/// Override for the worker binary location, used by tests and deployments
/// that relocate it.
pub const WORKER_ENV: &str = "ADAAD6_MUTATION_WORKER";

pub const WORKER_BINARY_NAME: &str = "adaad6-mutation-worker";

#[derive(Debug, Clone, Default)]
pub struct SandboxOutcome {
    pub ok: bool,
    pub timeout: bool,
    pub start_failed: bool,
    pub error: Option<String>,
    pub resource_caps: Option<Value>,
    pub exitcode: Option<i32>,
}

fn worker_binary() -> PathBuf {
    if let Ok(path) = std::env::var(WORKER_ENV) {
        return PathBuf::from(path);
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(WORKER_BINARY_NAME)))
        .unwrap_or_else(|| PathBuf::from(WORKER_BINARY_NAME))
}

/// CPU cap derived from the configured timeout: whole seconds, at least 1.
pub fn cpu_seconds_cap(timeout: f64) -> u64 {
    (timeout.ceil() as u64).max(1)
}

/// Run a candidate source in the isolated worker.
pub fn execute_in_sandbox(source: &str, timeout: f64) -> SandboxOutcome {
    let cpu_seconds = cpu_seconds_cap(timeout);
    let spawn = Command::new(worker_binary())
        .arg(cpu_seconds.to_string())
        .arg(SANDBOX_MEMORY_BYTES.to_string())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn();

    let mut child = match spawn {
        Ok(child) => child,
        Err(e) => {
            return SandboxOutcome {
                start_failed: true,
                error: Some(format!("start_failed:{e}")),
                ..SandboxOutcome::default()
            };
        }
    };

    // One-shot handoff: the script goes down stdin, then the pipe closes.
    if let Some(mut stdin) = child.stdin.take() {
        if stdin.write_all(source.as_bytes()).is_err() {
            let _ = child.kill();
            let _ = child.wait();
            return SandboxOutcome {
                start_failed: true,
                error: Some("start_failed:stdin closed".to_string()),
                ..SandboxOutcome::default()
            };
        }
    }

    let deadline = Instant::now() + Duration::from_secs_f64(timeout.max(0.01));
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return SandboxOutcome {
                        timeout: true,
                        ..SandboxOutcome::default()
                    };
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            Err(e) => {
                return SandboxOutcome {
                    error: Some(format!("sandbox_wait:{e}")),
                    ..SandboxOutcome::default()
                };
            }
        }
    };

    let exitcode = status.code();
    let Some(mut stdout) = child.stdout.take() else {
        return SandboxOutcome {
            error: Some("no_result".to_string()),
            exitcode,
            ..SandboxOutcome::default()
        };
    };

    let mut length_prefix = [0u8; 4];
    if stdout.read_exact(&mut length_prefix).is_err() {
        return SandboxOutcome {
            error: Some("no_result_no_message".to_string()),
            exitcode,
            ..SandboxOutcome::default()
        };
    }
    let length = u32::from_be_bytes(length_prefix) as usize;
    let mut payload = vec![0u8; length];
    if stdout.read_exact(&mut payload).is_err() {
        return SandboxOutcome {
            error: Some("no_result".to_string()),
            exitcode,
            ..SandboxOutcome::default()
        };
    }

    let message: Value = match serde_json::from_slice(&payload) {
        Ok(message) => message,
        Err(_) => {
            return SandboxOutcome {
                error: Some("no_result".to_string()),
                exitcode,
                ..SandboxOutcome::default()
            };
        }
    };

    SandboxOutcome {
        ok: message.get("ok").and_then(Value::as_bool).unwrap_or(false),
        timeout: false,
        start_failed: false,
        error: message
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string),
        resource_caps: message.get("resource_caps").cloned(),
        exitcode,
    }
}
