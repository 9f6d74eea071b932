//! Headless SPH simulation
//!
//! Usage: `sph_orchestrator [CONFIG.json] [--steps N] [--scenario NAME]`

use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use sph_orchestrator::{
    concentration_statistics, runner_for, RunnerState, SimulationConfig, TrackingConfig,
    WasteScenario,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Step limit used when the configuration sets no stopping condition.
const DEFAULT_STEPS: u64 = 1000;

struct Args {
    config_path: Option<String>,
    steps: Option<u64>,
    scenario: Option<WasteScenario>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config_path: None,
        steps: None,
        scenario: None,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--steps" => {
                let value = iter.next().ok_or("--steps needs a value")?;
                let steps = value
                    .parse::<u64>()
                    .map_err(|_| format!("invalid step count '{value}'"))?;
                args.steps = Some(steps);
            }
            "--scenario" => {
                let value = iter.next().ok_or("--scenario needs a value")?;
                args.scenario = Some(value.parse::<WasteScenario>().map_err(|e| format!("{e}"))?);
            }
            "-h" | "--help" => {
                return Err("usage: sph_orchestrator [CONFIG.json] [--steps N] [--scenario NAME]".into())
            }
            other if other.starts_with("--") => return Err(format!("unknown option '{other}'")),
            path => args.config_path = Some(path.to_string()),
        }
    }
    Ok(args)
}

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sph_orchestrator=info,sph_kernel=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::from(2);
        }
    };

    let mut config = match &args.config_path {
        Some(path) => match SimulationConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("{e}");
                return ExitCode::FAILURE;
            }
        },
        None => SimulationConfig::default(),
    };

    if let Some(steps) = args.steps {
        config.max_timesteps = Some(steps);
    }
    if let Some(scenario) = args.scenario {
        // Waste density follows the scenario
        config.tracking = Some(TrackingConfig {
            scenario,
            waste_density: None,
        });
    }
    if config.max_timesteps.is_none() && config.max_time.is_none() {
        tracing::info!("No stopping condition configured, running {DEFAULT_STEPS} steps");
        config.max_timesteps = Some(DEFAULT_STEPS);
    }

    tracing::info!("Starting SPH simulation: {}", config.name);
    let runner = match runner_for(&config) {
        Ok(runner) => runner,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    runner.start();
    while !runner.state().is_terminal() {
        thread::sleep(Duration::from_millis(500));
        tracing::info!(
            step = runner.timestep_count(),
            time = runner.sim_time(),
            "progress"
        );
    }

    let snapshot = runner.latest_snapshot();
    let metrics = runner.error_metrics();
    let error = runner.error_message();
    let state = match runner.join() {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(m) = metrics {
        tracing::info!(
            max_density_variation = m.max_density_variation,
            mass_drift = m.mass_conservation,
            contaminant_mass = m.contaminant_mass,
            "final metrics"
        );
    }
    if let Some(stats) = snapshot
        .as_ref()
        .and_then(|snap| concentration_statistics(&config, snap))
    {
        match serde_json::to_string_pretty(&stats) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::warn!("could not serialize statistics: {e}"),
        }
    }

    match state {
        RunnerState::Finished => ExitCode::SUCCESS,
        _ => {
            let msg = error.unwrap_or_else(|| format!("simulation stopped in state {state:?}"));
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}
