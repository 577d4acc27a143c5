//! Headless AI runner.
//!
//! Runs scripted scenarios through the opponent AI without a game client.
//! Designed for CI determinism checks and for inspecting AI decisions.
//!
//! # Usage
//!
//! ```bash
//! # Stream one run's commands as JSON lines
//! cargo run -p rts_headless -- run --scenario skirmish_1v1 --ticks 3600
//!
//! # Sweep seeds in parallel
//! cargo run -p rts_headless -- batch --count 100 --output results/batch.json
//!
//! # Verify determinism
//! cargo run -p rts_headless -- verify --seed 12345 --runs 5
//! ```
//!
//! # Protocol
//!
//! Output (stdout): JSON responses, one per line
//! Logs (stderr): Debug information

use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rts_ai::config::AiConfig;
use rts_ai::rules::RulesTable;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rts_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    protocol::{write_line, Response},
    runner::ScenarioRunner,
    scenario::{Scenario, ScenarioError},
};

#[derive(Parser)]
#[command(name = "rts_headless")]
#[command(about = "Headless opponent AI runner for testing and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// AI tunables (RON); defaults are used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Unit and building rules (RON); the standard table is used when omitted
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scenario and stream the AI's commands
    Run {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "skirmish_1v1")]
        scenario: String,

        /// Ticks to run
        #[arg(short, long, default_value = "3600")]
        ticks: u64,

        /// Base seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Emit a state hash every N ticks (0 = never)
        #[arg(long, default_value = "0")]
        hash_every: u64,
    },

    /// Run a batch of seeds in parallel
    Batch {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "skirmish_1v1")]
        scenario: String,

        /// Number of runs
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel runs (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Ticks per run
        #[arg(short, long, default_value = "3600")]
        ticks: u64,

        /// Starting seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Output JSON file for results
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify determinism by running same seed multiple times
    Verify {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "skirmish_1v1")]
        scenario: String,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Ticks per run
        #[arg(short, long, default_value = "3600")]
        ticks: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is for protocol
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let result = match cli.command {
        Commands::Run {
            scenario,
            ticks,
            seed,
            hash_every,
        } => cmd_run(&scenario, cli.config.as_deref(), cli.rules.as_deref(), ticks, seed, hash_every),
        Commands::Batch {
            scenario,
            count,
            parallel,
            ticks,
            seed,
            output,
        } => {
            let mut batch = BatchConfig::new(count, ticks).with_seed(seed);
            batch.parallel_runs = parallel;
            batch.output = output;
            cmd_batch(&scenario, cli.config.as_deref(), cli.rules.as_deref(), batch)
        }
        Commands::Verify {
            scenario,
            seed,
            ticks,
            runs,
        } => cmd_verify(&scenario, cli.config.as_deref(), cli.rules.as_deref(), seed, ticks, runs),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            let mut stdout = io::stdout().lock();
            let _ = write_line(&mut stdout, &Response::Error { message: e.to_string() });
            ExitCode::FAILURE
        }
    }
}

/// Scenario, tunables and rules for a command.
fn load_inputs(
    scenario: &str,
    config: Option<&Path>,
    rules: Option<&Path>,
) -> Result<(Scenario, AiConfig, RulesTable), ScenarioError> {
    let scenario = Scenario::resolve(scenario)?;
    let config = match config {
        Some(path) => AiConfig::load(path)?,
        None => AiConfig::default(),
    };
    let rules = match rules {
        Some(path) => RulesTable::load(path)?,
        None => RulesTable::standard(),
    };
    tracing::info!("Loaded scenario '{}' ({} factions)", scenario.name, scenario.factions.len());
    Ok((scenario, config, rules))
}

/// Run one scenario, streaming JSON lines to stdout
fn cmd_run(
    scenario: &str,
    config: Option<&Path>,
    rules: Option<&Path>,
    ticks: u64,
    seed: u64,
    hash_every: u64,
) -> Result<ExitCode, ScenarioError> {
    let (scenario, config, rules) = load_inputs(scenario, config, rules)?;
    let mut runner = ScenarioRunner::new(&scenario, config, rules, seed);
    let mut out = BufWriter::new(io::stdout().lock());

    write_line(&mut out, &runner.ready())?;
    for _ in 0..ticks {
        for response in runner.step() {
            write_line(&mut out, &response)?;
        }
        let tick = runner.snapshot().tick;
        if hash_every > 0 && tick % hash_every == 0 {
            write_line(
                &mut out,
                &Response::StateHash {
                    tick,
                    hash: runner.hash(),
                },
            )?;
        }
    }

    let summary = runner.summary();
    write_line(
        &mut out,
        &Response::Summary {
            ticks: summary.ticks,
            commands: summary.total_commands,
            hash: summary.hash,
        },
    )?;
    out.flush()?;

    eprintln!();
    eprintln!("Scenario: {}  seed: {}  ticks: {}", summary.scenario, summary.seed, summary.ticks);
    for (faction, f) in &summary.factions {
        eprintln!(
            "  faction {}: {} commands, {} strategy changes, final {} (desperation {}, credits {})",
            faction,
            f.commands,
            f.strategy_changes,
            f.final_strategy.name(),
            f.final_desperation,
            f.final_credits
        );
    }
    eprintln!("  hash: {:016x}", summary.hash);
    Ok(ExitCode::SUCCESS)
}

/// Run a batch of seeds
fn cmd_batch(
    scenario: &str,
    config: Option<&Path>,
    rules: Option<&Path>,
    batch: BatchConfig,
) -> Result<ExitCode, ScenarioError> {
    let (scenario, config, rules) = load_inputs(scenario, config, rules)?;
    let output = batch.output.clone();
    let results = run_batch(&scenario, &config, &rules, batch);

    eprintln!();
    eprintln!("╔════════════════════════════════════════╗");
    eprintln!("║           BATCH RESULTS                ║");
    eprintln!("╠════════════════════════════════════════╣");
    eprintln!("║ Runs: {:>32} ║", results.summary.runs);
    eprintln!("║ Mean commands/run: {:>19.1} ║", results.summary.mean_commands);
    eprintln!("║ Distinct command streams: {:>12} ║", results.summary.distinct_hashes);
    eprintln!("║ Duration: {:>27.1}s ║", results.duration_seconds);
    eprintln!("╚════════════════════════════════════════╝");
    for (faction, counts) in &results.summary.final_strategies {
        let parts: Vec<String> = counts.iter().map(|(s, n)| format!("{s}={n}")).collect();
        eprintln!("  faction {faction} final strategies: {}", parts.join(", "));
    }

    if let Some(path) = output {
        results.save(&path)?;
        tracing::info!("Results saved to {:?}", path);
    }
    Ok(ExitCode::SUCCESS)
}

/// Verify determinism
fn cmd_verify(
    scenario: &str,
    config: Option<&Path>,
    rules: Option<&Path>,
    seed: u64,
    ticks: u64,
    runs: u32,
) -> Result<ExitCode, ScenarioError> {
    let (scenario, config, rules) = load_inputs(scenario, config, rules)?;
    tracing::info!("Verifying determinism: '{}' seed {} x{} runs", scenario.name, seed, runs);

    if verify_determinism(&scenario, &config, &rules, seed, ticks, runs) {
        eprintln!("✓ Determinism verified: {runs} runs produced identical command streams");
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("✗ Determinism check FAILED: runs diverged");
        Ok(ExitCode::FAILURE)
    }
}
