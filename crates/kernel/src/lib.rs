//! SPH Fluid Simulation Kernel
//!
//! This crate provides the numerical core of a weakly-compressible SPH
//! (WCSPH) solver for a 3D fluid carrying a contaminant concentration field.
//! It is compute-only: no I/O, no rendering, no global state.
//!
//! # Modules
//! - [`particle`] -- Struct-of-arrays particle storage and `ParticleKind` enum.
//! - [`sph`] -- Cubic B-spline kernel, gradient, density and pressure passes.
//! - [`neighbor`] -- Uniform-grid spatial hash and fixed-capacity neighbor lists.
//! - [`eos`] -- Tait equation of state.
//! - [`forces`] -- Symmetric pressure, Morris viscosity, gravity, buoyancy.
//! - [`boundary`] -- Reflective axis-aligned box.
//! - [`integrate`] -- Symplectic Euler and adaptive CFL timestep.
//! - [`concentration`] -- Advection-diffusion of the concentration field.
//! - [`solver`] -- State ownership and the per-step pipeline.
//! - [`snapshot`] -- Point-in-time copies for external consumers.
//! - [`parallel`] -- Serial / rayon parallel-for dispatch.
//! - [`params`] -- Validated solver parameters.
//! - [`error`] -- Error taxonomy.

#![warn(missing_docs)]

pub mod boundary;
pub mod concentration;
pub mod eos;
pub mod error;
pub mod forces;
pub mod integrate;
pub mod neighbor;
pub mod parallel;
pub mod params;
pub mod particle;
pub mod snapshot;
pub mod solver;
pub mod sph;

pub use eos::{tait_eos, TaitEos};
pub use error::{InstabilityCause, SimError};
pub use neighbor::{NeighborGrid, NeighborList};
pub use parallel::Dispatch;
pub use params::{Aabb, SolverParams};
pub use particle::{ParticleArrays, ParticleKind};
pub use snapshot::Snapshot;
pub use solver::{ParticleInitializer, SimulationState, Solver, SolverPhase};
pub use sph::{cubic_spline, cubic_spline_gradient};

// ---------------------------------------------------------------------------
// SimulationKernel trait
// ---------------------------------------------------------------------------

/// Aggregate error / conservation metrics for a simulation snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorMetrics {
    /// Maximum relative density deviation from rest density across all particles.
    pub max_density_variation: f32,
    /// Relative total mass drift from initial mass (|M - M0| / |M0|).
    pub mass_conservation: f32,
    /// Total contaminant `sum_i m_i C_i` (kg).
    pub contaminant_mass: f64,
}

/// Summary of one completed step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// Step counter after this step.
    pub step: u64,
    /// Simulated time after this step (s).
    pub time: f64,
    /// Timestep that was used (s).
    pub dt: f32,
    /// Largest particle speed the timestep was chosen from (m/s).
    pub max_speed: f32,
    /// Largest acceleration magnitude the timestep was chosen from (m/s^2).
    pub max_acceleration: f32,
    /// Largest |rho - rho0| / rho0 after the density pass.
    pub max_density_variation: f32,
}

/// Interface the run loop drives.
///
/// A `SimulationKernel` owns its particle data and advances it one step at a
/// time; each step runs neighbor search, density, pressure, forces, timestep
/// selection, integration, boundary enforcement and (optionally) the
/// concentration update.
pub trait SimulationKernel {
    /// Execute one simulation step with an adaptively chosen timestep.
    fn step(&mut self) -> Result<StepReport, SimError>;

    /// Read back current particle state (immutable reference).
    fn particles(&self) -> &ParticleArrays;

    /// Copy out the current state.
    fn snapshot(&self) -> Snapshot;

    /// Get current error / conservation metrics.
    fn error_metrics(&self) -> ErrorMetrics;

    /// Number of particles in the simulation.
    fn particle_count(&self) -> usize;

    /// Simulated time (s).
    fn time(&self) -> f64;

    /// Completed steps.
    fn step_count(&self) -> u64;

    /// Stop the kernel; later steps fail.
    fn terminate(&mut self) {}
}
