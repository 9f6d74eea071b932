//! Orchestration Layer
//!
//! This crate drives the SPH solver from the outside:
//! - JSON configuration loading and validation
//! - Dam-break particle layout and waste scenarios
//! - Concentration analytics on snapshots
//! - Simulation runner with lifecycle management

#![warn(missing_docs)]

pub mod config;
pub mod domain;
pub mod metrics;
pub mod runner;
pub mod scenario;

pub use config::{SimulationConfig, TrackingConfig};
pub use domain::DamBreak;
pub use metrics::ConcentrationStatistics;
pub use runner::{RunnerOptions, RunnerState, SimulationRunner};
pub use scenario::WasteScenario;

use sph_kernel::{SimError, Solver};
use std::path::Path;

/// Create a complete simulation from a configuration file
///
/// This function performs the full simulation setup pipeline:
/// 1. Load and validate the configuration
/// 2. Place the dam-break particles and apply the waste scenario
/// 3. Initialize the solver
/// 4. Wrap it in a SimulationRunner for lifecycle management
///
/// # Example
/// ```no_run
/// use sph_orchestrator::create_simulation;
///
/// let runner = create_simulation("configs/dam_break.json")?;
/// runner.start();
/// // ... query status, pause, resume, etc.
/// # Ok::<(), sph_kernel::SimError>(())
/// ```
pub fn create_simulation(config_path: impl AsRef<Path>) -> Result<SimulationRunner, SimError> {
    let config_path = config_path.as_ref();
    tracing::info!("Creating simulation from config: {}", config_path.display());

    let config = SimulationConfig::load(config_path)?;
    tracing::info!("Configuration loaded: {}", config.name);

    runner_for(&config)
}

/// Build an initialized solver for `config`
pub fn build_solver(config: &SimulationConfig) -> Result<Solver, SimError> {
    config.validate()?;
    let params = config.solver_params();
    let layout = DamBreak::from_config(config);
    Solver::with_initializer(params, &layout)
}

/// Build the solver for `config` and wrap it in an idle runner
pub fn runner_for(config: &SimulationConfig) -> Result<SimulationRunner, SimError> {
    let solver = build_solver(config)?;
    tracing::info!(
        particles = solver.state().particles.len(),
        tracking = config.tracking.is_some(),
        "Simulation ready to start"
    );
    Ok(SimulationRunner::new(
        Box::new(solver),
        RunnerOptions::from_config(config),
    ))
}

/// Concentration statistics of a snapshot taken from a run of `config`
pub fn concentration_statistics(
    config: &SimulationConfig,
    snapshot: &sph_kernel::Snapshot,
) -> Option<ConcentrationStatistics> {
    let particle_volume = (config.particle_spacing as f64).powi(3);
    ConcentrationStatistics::from_snapshot(snapshot, particle_volume, config.domain.volume() as f64)
}
