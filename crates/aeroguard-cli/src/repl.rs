//! Interactive REPL with slash commands.

use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use aeroguard_agent::{Agent, CancelToken};
use aeroguard_types::{AssistantConfig, FinalResponse, VerificationStatus};
use colored::Colorize;

/// Run the REPL until `/quit`, EOF, or Ctrl-C shutdown.
pub fn run(cfg: AssistantConfig, cancel: CancelToken, shutdown: Arc<AtomicBool>) {
    let mut agent = Agent::new(cfg.clone());
    println!("  Type a question, or {} for commands.\n", "/help".bold());

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        print!("{} ", "aeroguard>".bold().cyan());
        let _ = std::io::stdout().flush();

        let Some(Ok(line)) = lines.next() else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/quit" | "/exit" => break,
            "/help" => print_help(),
            "/config" => println!("{cfg:#?}"),
            "/tools" => {
                for (name, description) in agent.tool_descriptions() {
                    println!("  {} {description}", format!("{name:<22}").bold());
                }
            }
            _ if input.starts_with('/') => {
                println!("  Unknown command {}. Try /help.", input.bold());
            }
            query => {
                let response = agent.run(query);
                print_response(&response);
                if cancel.is_canceled() {
                    break;
                }
            }
        }
    }
    println!("  Goodbye.");
}

fn print_help() {
    println!("  {}", "Commands".bold());
    println!("    /tools    list available tools");
    println!("    /config   show the active configuration");
    println!("    /quit     exit");
    println!();
    println!("  {}", "Try".bold());
    println!("    metar KDEN");
    println!("    crosswind landing at KDEN runway 26");
    println!("    is RPLL good for landing");
}

/// Render a response: guardrail verdict first, then the answer.
pub fn print_response(response: &FinalResponse) {
    let verdict = match (response.guardrail_status, response.is_fallback) {
        (VerificationStatus::Passed, _) => "verified".green().bold(),
        (VerificationStatus::Skipped, _) => "unverified (no claim to check)".yellow(),
        (VerificationStatus::Failed, true) => "SAFE-FAIL: conservative answer".red().bold(),
        (VerificationStatus::Failed, false) => "verification failed".red().bold(),
    };
    println!();
    println!("  [{verdict}]");
    if let Some(text) = &response.text_response {
        for line in text.lines() {
            println!("  {line}");
        }
    }
    if let Some(landing) = &response.landing {
        println!();
        println!(
            "  {} runway {} ({}°): crosswind {:.1} kt, headwind {:.1} kt",
            "Landing:".bold(),
            landing.runway_number,
            landing.runway_heading,
            landing.crosswind_kt,
            landing.headwind_kt,
        );
    }
    if let Some(verification) = response
        .details
        .verification
        .as_ref()
        .filter(|v| v.status != VerificationStatus::Skipped)
    {
        if let (Some(claim), Some(truth)) =
            (verification.agent_claim, verification.mathematical_truth)
        {
            println!(
                "  {} claim {claim:.2} kt vs math {truth:.2} kt",
                "Guardrail:".dimmed()
            );
        }
    }
    println!();
}
