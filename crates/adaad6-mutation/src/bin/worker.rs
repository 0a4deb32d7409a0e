//! Sandbox worker process
//!
//! Reads a seed script from stdin, applies OS resource caps, evaluates
//! the script with the restricted builtin set, and writes exactly one
//! length-prefixed JSON message to stdout.
//!
//! Usage: adaad6-mutation-worker <cpu_seconds> <memory_bytes>

use std::io::{Read, Write};

use serde_json::{json, Value};

use adaad6_mutation::ast::parse;
use adaad6_mutation::interp::run_module;

#[cfg(target_os = "linux")]
fn apply_resource_caps(cpu_seconds: u64, memory_bytes: u64) -> Value {
    let mut applied = json!({"supported": true});
    unsafe {
        let cpu = libc::rlimit {
            rlim_cur: cpu_seconds as libc::rlim_t,
            rlim_max: cpu_seconds as libc::rlim_t,
        };
        if libc::setrlimit(libc::RLIMIT_CPU, &cpu) == 0 {
            applied["cpu_seconds"] = json!(cpu_seconds);
        } else {
            applied["error"] = json!(std::io::Error::last_os_error().to_string());
        }

        let memory = libc::rlimit {
            rlim_cur: memory_bytes as libc::rlim_t,
            rlim_max: memory_bytes as libc::rlim_t,
        };
        if libc::setrlimit(libc::RLIMIT_AS, &memory) == 0 {
            applied["memory_bytes"] = json!(memory_bytes);
        } else {
            applied["error"] = json!(std::io::Error::last_os_error().to_string());
        }
    }
    applied
}

#[cfg(not(target_os = "linux"))]
fn apply_resource_caps(_cpu_seconds: u64, _memory_bytes: u64) -> Value {
    json!({"supported": false})
}

fn send(message: &Value) {
    let payload = message.to_string().into_bytes();
    let mut stdout = std::io::stdout().lock();
    let _ = stdout.write_all(&(payload.len() as u32).to_be_bytes());
    let _ = stdout.write_all(&payload);
    let _ = stdout.flush();
}

fn main() {
    let mut args = std::env::args().skip(1);
    let cpu_seconds: u64 = args
        .next()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(1);
    let memory_bytes: u64 = args
        .next()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(128 * 1024 * 1024);

    let applied = apply_resource_caps(cpu_seconds, memory_bytes);

    let mut source = String::new();
    if std::io::stdin().read_to_string(&mut source).is_err() {
        send(&json!({"ok": false, "error": "stdin unreadable"}));
        return;
    }

    let module = match parse(&source) {
        Ok(module) => module,
        Err(e) => {
            send(&json!({"ok": false, "error": format!("parse: {e}")}));
            return;
        }
    };

    match run_module(&module) {
        Ok(()) => send(&json!({"ok": true, "resource_caps": applied})),
        Err(e) => send(&json!({"ok": false, "error": e})),
    }
}
