//! RailView DST Simulator CLI
//!
//! Run deterministic simulation tests against the playback engine.

use clap::Parser;
use railview_core::{EngineConfig, EngineError};
use railview_sim::scenarios::ScenarioId;
use railview_sim::{ScenarioResult, ScenarioRunner};
use thiserror::Error;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// RailView Deterministic Simulation Testing CLI
#[derive(Parser, Debug)]
#[command(name = "railview-sim")]
#[command(about = "Run deterministic simulation tests for RailView", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (baseline, out_of_order, flaky_network, reset_race,
    /// line_collision, congestion, day_end, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of random seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Timer ticks per scenario (raised to each scenario's minimum)
    #[arg(short, long, default_value = "120")]
    ticks: u64,

    /// Engine configuration as JSON
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export per-tick markers to a JSON file for replay
    #[arg(long)]
    export: Option<String>,
}

#[derive(Debug, Error)]
enum SimError {
    #[error("{0}")]
    Config(#[from] EngineError),

    #[error("Failed to write export: {0}")]
    Export(#[from] std::io::Error),

    #[error("{0}")]
    Usage(String),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
    }

    match run(&args).await {
        Ok(0) => {}
        Ok(_) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    }
}

/// Runs the requested scenarios and returns the number of failed runs.
async fn run(args: &Args) -> Result<usize, SimError> {
    if !args.json {
        info!("RailView DST Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().map_err(|e| {
            let names: Vec<&str> = ScenarioId::all().iter().map(|s| s.name()).collect();
            SimError::Usage(format!("{e}\nAvailable scenarios: {}, all", names.join(", ")))
        })?]
    };

    let config = match &args.config {
        Some(path) => {
            let config = EngineConfig::from_json_file(path)?;
            config.validate()?;
            config
        }
        None => EngineConfig::default(),
    };

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    // Handle --export mode for replay
    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            return Err(SimError::Usage(
                "--export only supports a single scenario, not 'all'".to_string(),
            ));
        }
        let scenario = scenarios[0];
        info!("Running with export to: {}", export_path);

        let runner = ScenarioRunner::new(base_seed)
            .with_ticks(args.ticks)
            .with_config(config);
        let (result, export) = runner.run_recorded(scenario).await;
        export.write_to_file(export_path)?;
        info!("Exported {} frames to {}", export.frames.len(), export_path);

        report(&result);
        return Ok(usize::from(!result.passed));
    }

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = ScenarioRunner::new(seed)
            .with_ticks(args.ticks)
            .with_config(config.clone());

        for scenario in &scenarios {
            let result = runner.run(*scenario).await;
            if !args.json {
                report(&result);
            }
            if !result.passed {
                failed_count += 1;
            }
            all_results.push(result);
        }
    }

    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        // JSON output for CI parsing
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "ticks": r.ticks,
                    "final_time": r.final_time.to_string(),
                    "final_markers": r.final_markers,
                    "stats": r.stats,
                    "link": r.link,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{json}"),
            Err(e) => error!("Failed to encode summary: {e}"),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    Ok(failed_count)
}

fn report(result: &ScenarioResult) {
    if result.passed {
        info!(
            "✓ {} (seed={}) PASSED at {} with {} markers",
            result.scenario.name(),
            result.seed,
            result.final_time,
            result.final_markers
        );
    } else {
        error!(
            "✗ {} (seed={}) FAILED: {}",
            result.scenario.name(),
            result.seed,
            result.failure_reason.as_deref().unwrap_or("unknown")
        );
    }
}
