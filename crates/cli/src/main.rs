// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

mod vcd_trace;

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use vgpio_config::TestbenchConfig;
use vgpio_core::bridge::BridgeStats;
use vgpio_core::scenarios::{self, ScenarioError, ScenarioReport};
use vgpio_core::{SimulationError, Testbench};

const EXIT_PASS: u8 = 0;
const EXIT_ASSERT_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

const RESULT_SCHEMA_VERSION: &str = "1.0";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Virtual GPIO checkpoint testbench",
    long_about = None
)]
struct Cli {
    /// Enable per-cycle bus tracing
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a built-in scenario against the register bridge testbench.
    Run(RunArgs),

    /// List the built-in scenarios.
    List,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Scenario name (overrides `scenario` in the config file)
    #[arg(short, long)]
    scenario: Option<String>,

    /// Path to the testbench config (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the cycle budget
    #[arg(long)]
    timeout_cycles: Option<u64>,

    /// Write a waveform dump of the bus and bridge registers
    #[arg(long)]
    vcd: Option<PathBuf>,

    /// Print the run result as a single JSON line on stdout
    #[arg(long)]
    json: bool,

    /// Write the final testbench state (JSON)
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct RunResult {
    result_schema_version: String,
    status: String,
    scenario: String,
    cycles: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    bridge: BridgeStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<ScenarioReport>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.trace {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => run_scenario(args),
        Commands::List => list_scenarios(),
    }
}

fn list_scenarios() -> ExitCode {
    for scenario in scenarios::all() {
        println!("{:<20} {}", scenario.name(), scenario.description());
    }
    ExitCode::from(EXIT_PASS)
}

fn load_config(args: &RunArgs) -> anyhow::Result<TestbenchConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading testbench config: {:?}", path);
            TestbenchConfig::from_file(path)?
        }
        None => TestbenchConfig::default(),
    };
    if let Some(cycles) = args.timeout_cycles {
        config.timeout_cycles = cycles;
        config.validate()?;
    }
    Ok(config)
}

fn run_scenario(args: RunArgs) -> ExitCode {
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let Some(name) = args.scenario.clone().or_else(|| config.scenario.clone()) else {
        error!("No scenario given; use --scenario or set `scenario` in the config");
        return ExitCode::from(EXIT_CONFIG_ERROR);
    };
    let Some(scenario) = scenarios::by_name(&name) else {
        let known: Vec<_> = scenarios::all().iter().map(|s| s.name()).collect();
        error!("Unknown scenario '{}'. Available: {}", name, known.join(", "));
        return ExitCode::from(EXIT_CONFIG_ERROR);
    };

    let mut tb = match Testbench::new(&config) {
        Ok(tb) => tb,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    if let Some(path) = &args.vcd {
        match vcd_trace::VcdObserver::new(path) {
            Ok(observer) => {
                info!("Writing waveform to {:?}", path);
                tb.add_observer(Arc::new(observer));
            }
            Err(e) => {
                error!("Failed to create VCD file {:?}: {:#}", path, e);
                return ExitCode::from(EXIT_CONFIG_ERROR);
            }
        }
    }

    let (status, code, message, report) = match scenarios::run(scenario.as_ref(), &mut tb) {
        Ok(report) => {
            info!(
                "Scenario '{}' passed: {} checkpoints in {} cycles",
                report.name,
                report.checkpoints.len(),
                report.cycles
            );
            ("pass", EXIT_PASS, None, Some(report))
        }
        Err(e @ ScenarioError::Assertion { .. }) => {
            error!("Assertion failed: {}", e);
            ("fail", EXIT_ASSERT_FAIL, Some(e.to_string()), None)
        }
        Err(ScenarioError::Simulation(e @ SimulationError::Config(_))) => {
            error!("{}", e);
            ("error", EXIT_CONFIG_ERROR, Some(e.to_string()), None)
        }
        Err(ScenarioError::Simulation(e)) => {
            error!("Simulation error at cycle {}: {}", tb.cycle(), e);
            ("error", EXIT_RUNTIME_ERROR, Some(e.to_string()), None)
        }
    };

    if let Some(path) = &args.snapshot {
        write_snapshot(path, &tb);
    }

    if args.json {
        let result = RunResult {
            result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
            status: status.to_string(),
            scenario: name,
            cycles: tb.cycle(),
            message,
            bridge: tb.bridge_stats(),
            report,
        };
        match serde_json::to_string(&result) {
            Ok(line) => println!("{}", line),
            Err(e) => error!("Failed to serialize result: {}", e),
        }
    }

    ExitCode::from(code)
}

fn write_snapshot(path: &Path, tb: &Testbench) {
    match std::fs::File::create(path) {
        Ok(f) => {
            if let Err(e) = serde_json::to_writer_pretty(f, &tb.snapshot()) {
                error!("Failed to write snapshot {:?}: {}", path, e);
            }
        }
        Err(e) => error!("Failed to create snapshot {:?}: {}", path, e),
    }
}
