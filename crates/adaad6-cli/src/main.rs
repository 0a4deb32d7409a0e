//! ADAAD-6 CLI - deterministic command surface
//!
//! Machine output is canonical JSON on stdout, one document per line;
//! human summaries go to stderr so they never break pipelines. Every
//! command logs best-effort to the operational log; logging availability
//! never changes an exit code.
//!
//! ```bash
//! # Probe the workspace
//! adaad6 boot
//!
//! # Combined diagnostics, persisting the promotion gate verdict
//! adaad6 doctor --output both
//!
//! # Plan and run a goal
//! adaad6 plan "tighten the release"
//! adaad6 run "tighten the release" --archetype monetizer
//!
//! # Inspect and verify the provenance ledger
//! adaad6 ledger tail --limit 10
//! adaad6 ledger verify
//! ```

use adaad6_assurance::{append_jsonl_log_event, run_doctor, write_latest_report};
use adaad6_config::{
    environment_snapshot, load_config, AdaadConfig, EffectiveConfig, EnvKeyProvider,
};
use adaad6_crypto::canon::canonical_json;
use adaad6_kernel::{is_admissible, refusal_mode, refusal_vector};
use adaad6_ledger::{read_events, verify_chain};
use adaad6_orchestrator::{MetaOrchestrator, RunInputs};
use adaad6_planning::make_plan;
use adaad6_runtime::boot_sequence;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Map, Value};

/// ADAAD-6 deterministic CLI
#[derive(Parser)]
#[command(name = "adaad6")]
#[command(version)]
#[command(about = "Credibility-first agentic execution", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputMode {
    /// Machine output to stdout
    Json,
    /// Human output to stderr
    Text,
    /// Both
    Both,
}

#[derive(Subcommand)]
enum Commands {
    /// Run boot sequence checks
    Boot,

    /// Run combined diagnostics and persist the verdict
    Doctor {
        #[arg(long, value_enum, default_value = "json")]
        output: OutputMode,
    },

    /// Generate a plan for a goal
    Plan {
        /// Goal to plan for
        goal: String,
    },

    /// Orchestrate a goal end to end
    Run {
        /// Goal to execute
        goal: String,

        /// Archetype policy to apply
        #[arg(long)]
        archetype: Option<String>,
    },

    /// Ledger operations
    Ledger {
        #[command(subcommand)]
        action: LedgerCommands,
    },

    /// Evaluate the refusal-only evidence vector
    Refusal,

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum LedgerCommands {
    /// Tail ledger events
    Tail {
        /// Maximum number of events to read from the end
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Verify ledger hashchain integrity
    Verify,
}

fn emit(value: &Value) {
    println!("{}", canonical_json(value));
}

fn emit_stderr(text: &str) {
    eprintln!("{}", text.trim_end_matches('\n'));
}

/// Best-effort operational logging; never influences the exit code.
fn safe_log(cfg: &AdaadConfig, action: &str, outcome: &str, details: Map<String, Value>) {
    if let Err(e) = append_jsonl_log_event(cfg, action, outcome, details, None) {
        tracing::debug!(error = %e, "operational log unavailable");
    }
}

fn details(key: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    map
}

fn doctor_human_summary(report: &Value) -> String {
    let run_id = report["run_id"].as_str().unwrap_or("unknown");
    let status = report["status"].as_str().unwrap_or("FAIL");
    let mut lines = vec![format!("Doctor report [{run_id}]: {status}")];
    if let Some(summary) = report["checks_summary"].as_object() {
        for (name, check) in summary {
            let status = if check["skipped"].as_bool().unwrap_or(false) {
                "SKIPPED"
            } else if check["ok"].as_bool().unwrap_or(false) {
                "PASS"
            } else {
                "FAIL"
            };
            lines.push(format!("- {name}: {status}"));
        }
    }
    lines.join("\n")
}

fn run_command(cli: Cli) -> anyhow::Result<i32> {
    let effective = load_config(&environment_snapshot(), &EnvKeyProvider)?;
    let cfg = effective.config().clone();
    if let EffectiveConfig::Frozen(_, reason) = &effective {
        emit_stderr(&format!("configuration frozen: {}", reason.as_str()));
    }

    match cli.command {
        Commands::Boot => {
            let report = boot_sequence(&cfg);
            let payload = report.to_value();
            safe_log(
                &cfg,
                "boot",
                if report.ok { "ok" } else { "error" },
                details("result", payload.clone()),
            );
            emit(&payload);
            Ok(if report.ok { 0 } else { 1 })
        }

        Commands::Doctor { output } => {
            let report = run_doctor(&cfg);
            let payload = report.to_value();
            if let Err(e) = write_latest_report(&cfg, &report) {
                emit_stderr(&format!("could not persist doctor report: {e}"));
            }
            safe_log(
                &cfg,
                "doctor",
                if report.ok { "ok" } else { "error" },
                details("report", payload.clone()),
            );

            if output != OutputMode::Text {
                emit(&json!({"ok": report.ok, "report": payload}));
            }
            if output != OutputMode::Json {
                emit_stderr(&doctor_human_summary(&payload));
            }
            Ok(if report.ok { 0 } else { 1 })
        }

        Commands::Plan { goal } => {
            let plan = make_plan(&goal, &cfg)?;
            let payload = plan.to_value();
            safe_log(&cfg, "plan", "ok", details("plan", payload.clone()));
            emit(&json!({"ok": true, "plan": payload}));
            Ok(0)
        }

        Commands::Run { goal, archetype } => {
            let orchestrator = match archetype.as_deref() {
                Some(name) => MetaOrchestrator::with_archetype(name),
                None => MetaOrchestrator::new(),
            };
            let result = orchestrator.run(&goal, &cfg, RunInputs::default())?;
            let payload = json!({
                "ok": result.ok,
                "failure_reason": result.failure_reason.map(|r| r.as_str()),
                "boot": result.boot.to_value(),
                "plan": result.plan.as_ref().map(|p| p.to_value()),
                "execution": result.execution.as_ref().map(|e| e.to_value()),
            });
            safe_log(
                &cfg,
                "run",
                if result.ok { "ok" } else { "error" },
                details("result", payload.clone()),
            );
            emit(&payload);
            Ok(if result.ok { 0 } else { 1 })
        }

        Commands::Ledger { action } => {
            if !cfg.ledger_enabled {
                emit(&json!({"ok": false, "error": "ledger disabled"}));
                return Ok(2);
            }
            match action {
                LedgerCommands::Tail { limit } => {
                    let events = read_events(&cfg, limit)?;
                    emit(&json!({"ok": true, "count": events.len()}));
                    for event in &events {
                        emit(event);
                    }
                    Ok(0)
                }
                LedgerCommands::Verify => {
                    let events = read_events(&cfg, None)?;
                    let valid = verify_chain(&events);
                    emit(&json!({"ok": valid, "valid": valid, "count": events.len()}));
                    Ok(if valid { 0 } else { 1 })
                }
            }
        }

        Commands::Refusal => {
            let vector = refusal_vector()?;
            let admissible = is_admissible(&vector.evidence_bundle, &vector.nodes)?;
            let mode = refusal_mode(&vector.evidence_bundle, &vector.nodes)?;
            let payload = json!({
                "ok": true,
                "admissible": admissible,
                "refusal_mode": mode.map(|m| m.as_str()),
                "refusal_record": vector.refusal_record,
            });
            safe_log(&cfg, "refusal", "ok", details("result", payload.clone()));
            emit(&payload);
            Ok(0)
        }

        Commands::Version => {
            emit(&json!({
                "ok": true,
                "package_version": env!("CARGO_PKG_VERSION"),
                "config_schema_version": cfg.config_schema_version,
                "mode": cfg.mode.as_str(),
            }));
            Ok(0)
        }
    }
}

fn main() -> std::process::ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run_command(cli) {
        Ok(code) => std::process::ExitCode::from(code as u8),
        Err(e) => {
            emit(&json!({"ok": false, "error": e.to_string()}));
            std::process::ExitCode::from(1)
        }
    }
}
