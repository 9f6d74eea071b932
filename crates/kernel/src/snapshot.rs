//! Point-in-time copy of the particle state handed to external consumers.
//!
//! A snapshot owns its data; nothing in it borrows from the solver, so it
//! stays valid after the next `step()`.

use serde::Serialize;

use crate::particle::ParticleArrays;

/// Read-only copy of the simulation state after a completed step.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    /// Simulated time (s).
    pub time: f64,
    /// Number of completed steps.
    pub step: u64,
    /// Number of particles.
    pub particle_count: u32,
    /// Particle positions (m).
    pub positions: Vec<[f32; 3]>,
    /// Particle velocities (m/s).
    pub velocities: Vec<[f32; 3]>,
    /// Densities (kg/m^3).
    pub densities: Vec<f32>,
    /// Pressures (Pa).
    pub pressures: Vec<f32>,
    /// Particle masses (kg).
    pub masses: Vec<f32>,
    /// Concentrations, present only when tracking is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concentrations: Option<Vec<f32>>,
    /// Concentration gradients, present only when tracking is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concentration_gradients: Option<Vec<[f32; 3]>>,
}

impl Snapshot {
    /// Copy the state out of `particles`.
    ///
    /// `gradients` is `Some` only when concentration tracking is enabled; the
    /// concentrations are included under the same condition.
    pub fn capture(
        particles: &ParticleArrays,
        time: f64,
        step: u64,
        gradients: Option<&[[f32; 3]]>,
    ) -> Self {
        let n = particles.len();
        Self {
            time,
            step,
            particle_count: n as u32,
            positions: (0..n).map(|i| particles.position(i)).collect(),
            velocities: (0..n).map(|i| particles.velocity(i)).collect(),
            densities: particles.density.clone(),
            pressures: particles.pressure.clone(),
            masses: particles.mass.clone(),
            concentrations: gradients.map(|_| particles.concentration.clone()),
            concentration_gradients: gradients.map(|g| g.to_vec()),
        }
    }

    /// Total fluid mass (kg).
    pub fn total_mass(&self) -> f64 {
        self.masses.iter().map(|&m| m as f64).sum()
    }
}
