//! `aeroguard-cli` – the Aeroguard command line.
//!
//! The binary:
//!
//! 1. Loads `~/.aeroguard/config.toml` (writing defaults on first run) and
//!    applies `AEROGUARD_*` / guardrail env overrides.
//! 2. Installs a Ctrl-C handler that trips the request cancel token so an
//!    in-flight query terminates cleanly.
//! 3. Answers a one-shot query from the command line (`aeroguard "metar
//!    KDEN"`, add `--stream` for line-delimited JSON events), or drops into
//!    the interactive REPL.

mod config;
mod repl;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;

use aeroguard_agent::{Agent, CancelToken};
use aeroguard_types::AssistantConfig;
use colored::Colorize;

fn main() {
    // Structured logging; set AEROGUARD_LOG_FORMAT=json for NDJSON logs and
    // OTEL_EXPORTER_OTLP_ENDPOINT to forward spans.
    let _telemetry = aeroguard_agent::telemetry::init_telemetry("aeroguard");

    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let mut cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let cfg = AssistantConfig::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  First run: wrote defaults to {}",
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {e}", "Config write failed".yellow()),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {e}", "Config error".red());
            println!("  Using default configuration.");
            AssistantConfig::default()
        }
    };
    cfg.apply_env_overrides();
    println!(
        "  Backend: {} | guardrail threshold: {} kt",
        cfg.llm_backend.to_string().bold(),
        cfg.guardrail_threshold_kt
    );

    // ── Ctrl-C: cancel the in-flight request, then exit the REPL ──────────
    let cancel = CancelToken::new();
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        let shutdown = Arc::clone(&shutdown);
        if let Err(e) = ctrlc::set_handler(move || {
            println!();
            println!("{}", "Ctrl-C received: canceling and shutting down.".yellow());
            cancel.cancel();
            shutdown.store(true, Ordering::SeqCst);
        }) {
            eprintln!("[aeroguard] failed to install Ctrl-C handler: {e}");
        }
    }

    // ── One-shot vs REPL ──────────────────────────────────────────────────
    let args: Vec<String> = std::env::args().skip(1).collect();
    let stream = args.iter().any(|a| a == "--stream");
    let query = args
        .iter()
        .filter(|a| !a.starts_with("--"))
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");

    if !query.is_empty() {
        if stream {
            run_streaming(cfg, &query, &cancel);
        } else {
            let mut agent = Agent::new(cfg);
            let response = agent.run(&query);
            repl::print_response(&response);
        }
        return;
    }

    repl::run(cfg, cancel, shutdown);
}

/// One-shot streaming mode: NDJSON events on stdout, one object per line.
fn run_streaming(cfg: AssistantConfig, query: &str, cancel: &CancelToken) {
    let (tx, rx) = mpsc::sync_channel(64);
    let query = query.to_string();
    let cancel = cancel.clone();
    let worker = std::thread::spawn(move || {
        let mut agent = Agent::new(cfg);
        agent.run_stream(&query, &cancel, tx);
    });
    for event in rx {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("[aeroguard] event serialization failed: {e}"),
        }
    }
    if worker.join().is_err() {
        eprintln!("[aeroguard] worker thread panicked");
    }
}

fn print_banner() {
    println!();
    println!("  {}", "AEROGUARD".bold().cyan());
    println!("  Guardrail-verified aviation weather assistant");
    println!("  {}", "Every crosswind figure is re-derived before you see it.".dimmed());
    println!();
}
