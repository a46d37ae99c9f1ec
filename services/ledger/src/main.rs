//! Attack scenario runner
//!
//! Usage:
//!   breach --list
//!   breach --scenario spot_price_lending
//!   breach --config scenarios/custom.toml --json

use anyhow::{Context, Result};
use breach_ledger::{presets, run_attack, AttackOutcome, ScenarioConfig};
use breach_types::format_ether;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "breach")]
#[command(about = "Run atomic attack scenarios against a simulated ledger")]
#[command(version)]
struct Args {
    /// Built-in scenario to run
    #[arg(short, long, conflicts_with = "config")]
    scenario: Option<String>,

    /// Scenario file (.json or .toml)
    #[arg(short, long)]
    config: Option<String>,

    /// List built-in scenarios and exit
    #[arg(long)]
    list: bool,

    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_logs: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    if args.list {
        for config in presets::all() {
            println!("{:<24} {}", config.name, config.description);
        }
        return Ok(());
    }

    let mut config = match (&args.scenario, &args.config) {
        (Some(name), _) => presets::preset(name)
            .with_context(|| format!("Unknown scenario '{name}', try --list"))?,
        (None, Some(path)) => ScenarioConfig::from_file(path)
            .with_context(|| format!("Failed to load scenario from {path}"))?,
        (None, None) => anyhow::bail!("Pass --scenario <name>, --config <path> or --list"),
    };
    config.apply_env_overrides();

    info!("Loaded scenario '{}' with {} units", config.name, config.units.len());
    let outcome = run_attack(&config).map_err(|e| {
        error!("Scenario failed to run: {}", e);
        e
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.to_lowercase()));

    if args.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn print_outcome(outcome: &AttackOutcome) {
    println!("Scenario: {} (t={})", outcome.scenario, outcome.final_time);
    for unit in &outcome.units {
        match (&unit.kind, &unit.error) {
            (Some(kind), Some(error)) => println!(
                "  unit {} [{}] {}: ABORTED {} at {:?}: {}",
                unit.index,
                unit.caller,
                unit.label,
                kind,
                unit.failed_at.as_deref().unwrap_or_default(),
                error
            ),
            _ => println!(
                "  unit {} [{}] {}: committed ({} effects)",
                unit.index, unit.caller, unit.label, unit.effects
            ),
        }
    }
    println!("Invariants:");
    for report in &outcome.invariants {
        let mark = if report.held { "held  " } else { "BROKEN" };
        println!("  {} {:<36} {}", mark, report.name, report.detail);
    }
    println!("Final balances:");
    for (account, holdings) in &outcome.balances {
        let rendered: Vec<String> = holdings
            .0
            .iter()
            .map(|(asset, amount)| format!("{} {}", format_ether(*amount), asset))
            .collect();
        println!("  {:<24} {}", account.as_str(), rendered.join(", "));
    }
    println!(
        "pool solvency held: {}, zero residual debt held: {}",
        outcome.pool_solvency_held, outcome.zero_residual_debt_held
    );
}
