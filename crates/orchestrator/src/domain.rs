//! Domain setup: dam-break particle placement

use sph_kernel::{Aabb, ParticleArrays, ParticleInitializer, SimError, SolverParams};

use crate::config::SimulationConfig;
use crate::scenario::WasteScenario;

/// Column of fluid resting in the `domain.min` corner of the box.
///
/// Particles sit on a cell-centred lattice and are placed bottom layer first,
/// so truncating to `particle_count` removes the top of the column.
#[derive(Debug, Clone, PartialEq)]
pub struct DamBreak {
    /// Upper bound on the number of particles
    pub particle_count: usize,
    /// Lattice spacing (meters)
    pub spacing: f32,
    /// Fraction of the box filled along each axis
    pub fill_fraction: [f32; 3],
    /// Waste distribution applied after placement
    pub scenario: Option<WasteScenario>,
}

impl DamBreak {
    /// Layout described by a configuration
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            particle_count: config.particle_count,
            spacing: config.particle_spacing,
            fill_fraction: config.fill_fraction,
            scenario: config.tracking.as_ref().map(|t| t.scenario),
        }
    }

    /// Lattice cells per axis inside the fluid block
    pub fn block_dims(&self, domain: &Aabb) -> [usize; 3] {
        let extent = domain.extent();
        let mut dims = [0usize; 3];
        for k in 0..3 {
            let len = self.fill_fraction[k] * extent[k];
            // Tolerate round-off when the block is an exact multiple of the spacing
            dims[k] = (len / self.spacing + 1.0e-4).floor().max(0.0) as usize;
        }
        dims
    }

    /// Number of particles the fluid block can hold
    pub fn capacity(&self, domain: &Aabb) -> usize {
        self.block_dims(domain).iter().product()
    }
}

impl ParticleInitializer for DamBreak {
    fn build(&self, params: &SolverParams) -> Result<ParticleArrays, SimError> {
        let domain = &params.domain;
        let [nx, ny, nz] = self.block_dims(domain);
        let capacity = nx * ny * nz;
        if capacity == 0 {
            return Err(SimError::config(format!(
                "fluid block {:?} of the domain holds no particles at spacing {}",
                self.fill_fraction, self.spacing
            )));
        }

        let count = self.particle_count.min(capacity);
        if count < self.particle_count {
            tracing::warn!(
                requested = self.particle_count,
                placed = count,
                "fluid block holds only {} particles, layout truncated",
                capacity
            );
        }

        let s = self.spacing;
        let mass = params.rest_density * s * s * s;
        let mut particles = ParticleArrays::with_capacity(count);

        'fill: for j in 0..ny {
            for k in 0..nz {
                for i in 0..nx {
                    if particles.len() == count {
                        break 'fill;
                    }
                    let x = domain.min[0] + (i as f32 + 0.5) * s;
                    let y = domain.min[1] + (j as f32 + 0.5) * s;
                    let z = domain.min[2] + (k as f32 + 0.5) * s;
                    particles.push_particle(x, y, z, mass, params.rest_density);
                }
            }
        }

        if params.track_concentration {
            if let Some(scenario) = self.scenario {
                scenario.apply(&mut particles, domain);
            }
        }

        tracing::info!(
            particles = particles.len(),
            block = ?[nx, ny, nz],
            mass,
            "Dam-break layout placed"
        );
        Ok(particles)
    }
}
