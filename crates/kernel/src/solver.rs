//! Solver orchestrator: owns the simulation state and runs the per-step
//! pipeline.
//!
//! ```text
//! neighbors -> density -> pressure -> forces -> dt -> integrate -> boundary
//!           -> concentration (if tracked) -> time += dt, step += 1
//! ```
//!
//! Each pass completes for every particle before the next one starts. After
//! the pipeline the aggregate state is checked once for divergence.

use crate::boundary::enforce_box;
use crate::concentration;
use crate::error::{InstabilityCause, SimError};
use crate::forces::compute_accelerations;
use crate::integrate::{compute_timestep, symplectic_euler};
use crate::neighbor::{NeighborGrid, NeighborList};
use crate::params::SolverParams;
use crate::particle::ParticleArrays;
use crate::snapshot::Snapshot;
use crate::sph::{compute_density, compute_pressure};
use crate::{ErrorMetrics, SimulationKernel, StepReport};

/// Lifecycle phase of a [`Solver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverPhase {
    /// Parameters validated, no particles yet.
    Uninitialized,
    /// Particles loaded, no step taken.
    Initialized,
    /// At least one step taken.
    Stepping,
    /// Stopped; state stays readable but is never mutated again.
    Terminated,
}

/// Produces the initial particle layout for a run.
pub trait ParticleInitializer {
    /// Build the particles. Positions must lie inside `params.domain`.
    fn build(&self, params: &SolverParams) -> Result<ParticleArrays, SimError>;
}

impl ParticleInitializer for ParticleArrays {
    fn build(&self, _params: &SolverParams) -> Result<ParticleArrays, SimError> {
        Ok(self.clone())
    }
}

/// Everything the solver mutates: particle arrays, the spatial grid, the
/// per-step neighbor lists, and the clock.
#[derive(Debug, Clone)]
pub struct SimulationState {
    /// Particle arrays.
    pub particles: ParticleArrays,
    /// Spatial hash, rebuilt every step.
    pub grid: NeighborGrid,
    /// Neighbor lists of the last step.
    pub neighbors: NeighborList,
    /// Concentration gradients of the last step (empty when not tracking).
    pub concentration_gradients: Vec<[f32; 3]>,
    /// Simulated time (s).
    pub time: f64,
    /// Completed steps.
    pub step: u64,
    /// Timestep used by the last step (s).
    pub dt: f32,
}

/// Reference CPU implementation of the WCSPH solver.
#[derive(Debug)]
pub struct Solver {
    params: SolverParams,
    phase: SolverPhase,
    state: SimulationState,
    initial_mass: f64,
}

impl Solver {
    /// Validate `params` and create an uninitialized solver.
    pub fn new(params: SolverParams) -> Result<Self, SimError> {
        params.validate()?;
        let grid = NeighborGrid::new(params.cell_size, params.domain.min, params.domain.max);
        let neighbors = NeighborList::new(params.max_neighbors);
        Ok(Self {
            state: SimulationState {
                particles: ParticleArrays::new(),
                grid,
                neighbors,
                concentration_gradients: Vec::new(),
                time: 0.0,
                step: 0,
                dt: 0.0,
            },
            params,
            phase: SolverPhase::Uninitialized,
            initial_mass: 0.0,
        })
    }

    /// Validate and build a solver, then load particles from `init`.
    pub fn with_initializer(
        params: SolverParams,
        init: &dyn ParticleInitializer,
    ) -> Result<Self, SimError> {
        let mut solver = Self::new(params)?;
        solver.initialize(init)?;
        Ok(solver)
    }

    /// Load the initial particle layout. Only valid while `Uninitialized`.
    pub fn initialize(&mut self, init: &dyn ParticleInitializer) -> Result<(), SimError> {
        if self.phase != SolverPhase::Uninitialized {
            return Err(SimError::InvalidPhase(self.phase));
        }
        let particles = init.build(&self.params)?;
        validate_particles(&particles, &self.params)?;

        self.initial_mass = particles.mass.iter().map(|&m| m as f64).sum();
        self.state.concentration_gradients = if self.params.track_concentration {
            vec![[0.0; 3]; particles.len()]
        } else {
            Vec::new()
        };
        self.state.particles = particles;
        self.phase = SolverPhase::Initialized;

        let dims = self.state.grid.dims();
        tracing::info!(
            particles = self.state.particles.len(),
            h = self.params.smoothing_length,
            cell_size = self.params.cell_size,
            grid = ?dims,
            tracking = self.params.track_concentration,
            dispatch = ?self.params.dispatch,
            "solver initialized"
        );
        Ok(())
    }

    /// Advance the simulation by one adaptive timestep.
    ///
    /// Every pass runs to completion; afterwards the state is checked once
    /// and a [`SimError::NumericalInstability`] is returned if anything
    /// diverged. The (diverged) state stays readable.
    pub fn step(&mut self) -> Result<StepReport, SimError> {
        match self.phase {
            SolverPhase::Initialized | SolverPhase::Stepping => {}
            phase => return Err(SimError::InvalidPhase(phase)),
        }
        self.phase = SolverPhase::Stepping;

        let params = &self.params;
        let dispatch = params.dispatch;
        let h = params.smoothing_length;
        let state = &mut self.state;
        let n = state.particles.len();

        // --- 1. Neighbor search ---
        {
            let p = &state.particles;
            state.grid.update(&p.x, &p.y, &p.z);
            state
                .neighbors
                .build(&state.grid, &p.x, &p.y, &p.z, params.support_radius(), dispatch);
        }

        // --- 2. Density and pressure ---
        compute_density(
            &mut state.particles,
            &state.neighbors,
            h,
            params.rest_density,
            dispatch,
        );
        compute_pressure(&mut state.particles, &params.eos(), dispatch);

        // --- 3. Forces ---
        compute_accelerations(&mut state.particles, &state.neighbors, params, dispatch);

        // --- 4. Adaptive timestep from the current state ---
        let p = &state.particles;
        let max_speed = dispatch.max(n, |i| p.speed(i));
        let max_accel = dispatch.max(n, |i| p.acceleration_magnitude(i));
        let choice = compute_timestep(max_speed, max_accel, params);
        let dt = choice.dt;

        // --- 5. Integrate and enforce the box ---
        symplectic_euler(&mut state.particles, dt);
        enforce_box(&mut state.particles, &params.domain, params.restitution);

        // --- 6. Concentration ---
        if params.track_concentration {
            let p = &state.particles;
            let gradients = concentration::compute_gradients(p, &state.neighbors, h, dispatch);
            let laplacian = concentration::compute_laplacian(
                p,
                &state.neighbors,
                h,
                params.viscosity_epsilon_sq(),
                dispatch,
            );
            concentration::update_concentration(
                &mut state.particles,
                &gradients,
                &laplacian,
                params.diffusion_coefficient,
                dt,
            );
            state.concentration_gradients = gradients;
        }

        // --- 7. Clock ---
        state.time += dt as f64;
        state.step += 1;
        state.dt = dt;

        // --- 8. Divergence check on aggregates ---
        let p = &state.particles;
        let saturated = state.neighbors.saturated_count();
        let cause = if !dispatch.max(n, |i| p.density[i].abs()).is_finite() {
            Some(InstabilityCause::NonFiniteDensity)
        } else if !dispatch.max(n, |i| p.pressure[i].abs()).is_finite() {
            Some(InstabilityCause::NonFinitePressure)
        } else if !choice.stable {
            if max_speed.is_finite() {
                Some(InstabilityCause::NonFiniteAcceleration)
            } else {
                Some(InstabilityCause::NonFiniteVelocity)
            }
        } else if !dispatch.max(n, |i| p.speed(i)).is_finite() {
            Some(InstabilityCause::NonFiniteVelocity)
        } else if !dispatch
            .max(n, |i| p.x[i].abs().max(p.y[i].abs()).max(p.z[i].abs()))
            .is_finite()
        {
            Some(InstabilityCause::NonFinitePosition)
        } else if saturated > 0 {
            Some(InstabilityCause::NeighborOverflow {
                particles: saturated,
            })
        } else {
            None
        };

        if let Some(cause) = cause {
            tracing::warn!(
                step = state.step,
                time = state.time,
                max_neighbors_found = state.neighbors.max_found(),
                %cause,
                "numerical instability detected"
            );
            return Err(SimError::NumericalInstability {
                step: state.step,
                cause,
            });
        }

        let rho0 = params.rest_density;
        Ok(StepReport {
            step: state.step,
            time: state.time,
            dt,
            max_speed,
            max_acceleration: max_accel,
            max_density_variation: dispatch.max(n, |i| (p.density[i] - rho0).abs() / rho0),
        })
    }

    /// Stop the run. Further `step` calls fail; the state stays readable.
    pub fn terminate(&mut self) {
        if self.phase != SolverPhase::Terminated {
            tracing::debug!(step = self.state.step, "solver terminated");
        }
        self.phase = SolverPhase::Terminated;
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SolverPhase {
        self.phase
    }

    /// Parameters the solver was built with.
    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    /// Read-only view of the full simulation state.
    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Copy the current state out for external consumers.
    pub fn snapshot(&self) -> Snapshot {
        let gradients = self
            .params
            .track_concentration
            .then_some(self.state.concentration_gradients.as_slice());
        Snapshot::capture(&self.state.particles, self.state.time, self.state.step, gradients)
    }
}

/// Reject layouts the solver cannot run.
fn validate_particles(p: &ParticleArrays, params: &SolverParams) -> Result<(), SimError> {
    let n = p.len();
    if n == 0 {
        return Err(SimError::config("initial layout contains no particles"));
    }
    let lengths = [
        p.y.len(),
        p.z.len(),
        p.vx.len(),
        p.vy.len(),
        p.vz.len(),
        p.ax.len(),
        p.ay.len(),
        p.az.len(),
        p.density.len(),
        p.pressure.len(),
        p.mass.len(),
        p.concentration.len(),
        p.kind.len(),
    ];
    if lengths.iter().any(|&len| len != n) {
        return Err(SimError::config("particle arrays have inconsistent lengths"));
    }
    for i in 0..n {
        let m = p.mass[i];
        if !(m.is_finite() && m > 0.0) {
            return Err(SimError::config(format!(
                "particle {i} has invalid mass {m}"
            )));
        }
        let pos = p.position(i);
        if !params.domain.contains(pos) {
            return Err(SimError::config(format!(
                "particle {i} at {pos:?} lies outside the domain"
            )));
        }
        if !p.velocity(i).iter().all(|v| v.is_finite()) {
            return Err(SimError::config(format!(
                "particle {i} has a non-finite velocity"
            )));
        }
        let c = p.concentration[i];
        if !(0.0..=1.0).contains(&c) {
            return Err(SimError::config(format!(
                "particle {i} has concentration {c} outside [0, 1]"
            )));
        }
    }
    Ok(())
}

impl SimulationKernel for Solver {
    fn step(&mut self) -> Result<StepReport, SimError> {
        Solver::step(self)
    }

    fn particles(&self) -> &ParticleArrays {
        &self.state.particles
    }

    fn snapshot(&self) -> Snapshot {
        Solver::snapshot(self)
    }

    fn error_metrics(&self) -> ErrorMetrics {
        let p = &self.state.particles;
        let rho0 = self.params.rest_density;
        let dispatch = self.params.dispatch;
        let max_density_variation =
            dispatch.max(p.len(), |i| (p.density[i] - rho0).abs() / rho0);

        let current_mass: f64 = p.mass.iter().map(|&m| m as f64).sum();
        let mass_conservation = if self.initial_mass.abs() > 1.0e-12 {
            ((current_mass - self.initial_mass) / self.initial_mass).abs() as f32
        } else {
            (current_mass - self.initial_mass).abs() as f32
        };

        ErrorMetrics {
            max_density_variation,
            mass_conservation,
            contaminant_mass: concentration::total_contaminant_mass(p),
        }
    }

    fn particle_count(&self) -> usize {
        self.state.particles.len()
    }

    fn time(&self) -> f64 {
        self.state.time
    }

    fn step_count(&self) -> u64 {
        self.state.step
    }

    fn terminate(&mut self) {
        Solver::terminate(self)
    }
}
