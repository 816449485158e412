//! CLI entry point for the Decision-Proof Protocol e2e harness.
//!
//! Usage:
//!   dpp-e2e-harness [SCENARIO] [OPTIONS]
//!
//! SCENARIO one of: happy-path, pow-timeout, stage2-low-accuracy,
//! stage2-timing-variance, stage3-human-environment,
//! stage4-clustered-history, all (default).
//!
//! Options:
//!   --ws-url URL     WebSocket verify endpoint (default: ws://localhost:8080/ws/verify)
//!   --http-url URL   HTTP base URL (default: http://localhost:8080)
//!   --output FILE    Write the transcript(s) to FILE as JSON
//!   --help           Show help

use std::env;
use std::fs::File;
use std::io::Write;

use dpp_e2e_harness::{
    run_all, run_happy_path, run_pow_timeout, run_stage2_low_accuracy, run_stage2_timing_variance,
    run_stage3_human_environment, run_stage4_clustered_history, HarnessConfig, HarnessResult,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return;
    }

    let mut config = HarnessConfig::default();
    let mut output_file: Option<String> = None;
    let mut scenario = "all".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--ws-url" if i + 1 < args.len() => {
                config.ws_url = args[i + 1].clone();
                i += 1;
            }
            "--http-url" if i + 1 < args.len() => {
                config.http_base_url = args[i + 1].clone();
                i += 1;
            }
            "--output" if i + 1 < args.len() => {
                output_file = Some(args[i + 1].clone());
                i += 1;
            }
            other if !other.starts_with("--") => scenario = other.to_string(),
            other => eprintln!("Unknown argument: {other}"),
        }
        i += 1;
    }

    println!("==============================================");
    println!("  Decision-Proof Protocol e2e harness");
    println!("==============================================");
    println!("WS URL: {}", config.ws_url);
    println!("HTTP URL: {}", config.http_base_url);
    println!("Scenario: {scenario}\n");

    let results = match scenario.as_str() {
        "happy-path" => vec![run_happy_path(config).await],
        "pow-timeout" => vec![run_pow_timeout(config).await],
        "stage2-low-accuracy" => vec![run_stage2_low_accuracy(config).await],
        "stage2-timing-variance" => vec![run_stage2_timing_variance(config).await],
        "stage3-human-environment" => vec![run_stage3_human_environment(config).await],
        "stage4-clustered-history" => vec![run_stage4_clustered_history(config).await],
        "all" => run_all(config).await,
        other => {
            eprintln!("Unknown scenario: {other}");
            std::process::exit(2);
        }
    };

    if let Some(path) = &output_file {
        let transcripts: Vec<_> = results.iter().map(|r| &r.transcript).collect();
        let json = serde_json::to_string_pretty(&transcripts).expect("serialize transcripts");
        let mut file = File::create(path).expect("create output file");
        file.write_all(json.as_bytes()).expect("write transcript");
        println!("Transcripts written to: {path}\n");
    }

    let mut all_ok = true;
    for result in &results {
        print_result(result);
        all_ok &= result.success && result.transcript.all_invariants_passed();
    }

    if !all_ok {
        std::process::exit(1);
    }
    println!("All scenarios completed successfully.");
}

fn print_result(result: &HarnessResult) {
    let status = if result.success { "OK" } else { "FAILED" };
    println!("[{status}] {}", result.transcript.scenario);
    for check in &result.transcript.invariants_checked {
        let mark = if check.passed { "pass" } else { "FAIL" };
        println!("    [{mark}] {}: {}", check.name, check.message);
    }
    if let Some(error) = &result.error {
        println!("    error: {error}");
    }
    println!();
}

fn print_help() {
    println!(
        r#"Decision-Proof Protocol e2e harness

Usage:
  dpp-e2e-harness [SCENARIO] [OPTIONS]

SCENARIO:
  happy-path                  full accept, mock-mode oracle
  pow-timeout                 reject at stage 1
  stage2-low-accuracy         reject at stage 2 (accuracy gate)
  stage2-timing-variance      reject at stage 2 (timing-variance gate)
  stage3-human-environment    reject at stage 3
  stage4-clustered-history    reject at stage 4 (cross-session consistency)
  all                         run every scenario above (default)

Options:
  --ws-url URL     WebSocket verify endpoint (default: ws://localhost:8080/ws/verify)
  --http-url URL   HTTP base URL (default: http://localhost:8080)
  --output FILE    Write the transcript(s) to FILE as JSON
  --help           Show this help
"#
    );
}
