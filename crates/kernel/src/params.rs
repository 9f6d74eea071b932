//! Validated solver parameters.
//!
//! All values are fixed for one simulation run; there is no runtime
//! reconfiguration once the solver has been initialized.

use crate::eos::TaitEos;
use crate::error::SimError;
use crate::neighbor::{NeighborGrid, MAX_GRID_CELLS};
use crate::parallel::Dispatch;

/// Default particle spacing (m).
pub const DEFAULT_SPACING: f32 = 0.05;

/// Default ratio of smoothing length to particle spacing.
pub const DEFAULT_SMOOTHING_RATIO: f32 = 1.2;

/// Axis-aligned simulation box.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Aabb {
    /// Minimum corner (m).
    pub min: [f32; 3],
    /// Maximum corner (m).
    pub max: [f32; 3],
}

impl Default for Aabb {
    fn default() -> Self {
        Self {
            min: [0.0; 3],
            max: [1.0; 3],
        }
    }
}

impl Aabb {
    /// Create a box from its two corners.
    pub fn new(min: [f32; 3], max: [f32; 3]) -> Self {
        Self { min, max }
    }

    /// Edge lengths of the box.
    pub fn extent(&self) -> [f32; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    /// Centre of the box.
    pub fn center(&self) -> [f32; 3] {
        [
            0.5 * (self.min[0] + self.max[0]),
            0.5 * (self.min[1] + self.max[1]),
            0.5 * (self.min[2] + self.max[2]),
        ]
    }

    /// Box volume (m^3).
    pub fn volume(&self) -> f32 {
        let e = self.extent();
        e[0] * e[1] * e[2]
    }

    /// `true` if `p` lies inside the box, faces included.
    pub fn contains(&self, p: [f32; 3]) -> bool {
        (0..3).all(|k| p[k] >= self.min[k] && p[k] <= self.max[k])
    }
}

/// Parameter block the solver is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverParams {
    /// Smoothing length h (m). Kernel support radius is 2h.
    pub smoothing_length: f32,
    /// Neighbor grid cell size (m). Must be >= 2h.
    pub cell_size: f32,
    /// Rest density rho0 (kg/m^3).
    pub rest_density: f32,
    /// Artificial speed of sound c_s (m/s).
    pub speed_of_sound: f32,
    /// Dynamic viscosity coefficient used by the Morris term.
    pub viscosity: f32,
    /// Constant body acceleration (m/s^2).
    pub gravity: [f32; 3],
    /// CFL coefficient in (0, 1].
    pub cfl_number: f32,
    /// Upper bound on the adaptive timestep (s).
    pub max_timestep: f32,
    /// Lower bound on the adaptive timestep (s).
    pub min_timestep: f32,
    /// Contaminant diffusion coefficient D (m^2/s).
    pub diffusion_coefficient: f32,
    /// Wall restitution coefficient e in [0, 1).
    pub restitution: f32,
    /// Simulation box.
    pub domain: Aabb,
    /// Neighbor buffer capacity per particle.
    pub max_neighbors: usize,
    /// Evolve the concentration field.
    pub track_concentration: bool,
    /// Density of the waste phase; enables buoyancy for waste particles.
    pub waste_density: Option<f32>,
    /// Serial or parallel per-particle passes.
    pub dispatch: Dispatch,
}

impl Default for SolverParams {
    fn default() -> Self {
        let h = DEFAULT_SMOOTHING_RATIO * DEFAULT_SPACING;
        Self {
            smoothing_length: h,
            cell_size: 2.0 * h,
            rest_density: 1000.0,
            speed_of_sound: 100.0,
            viscosity: 0.001,
            gravity: [0.0, -9.81, 0.0],
            cfl_number: 0.25,
            max_timestep: 1.0e-3,
            min_timestep: 1.0e-6,
            diffusion_coefficient: 1.0e-9,
            restitution: 0.5,
            domain: Aabb::default(),
            max_neighbors: 256,
            track_concentration: false,
            waste_density: None,
            dispatch: Dispatch::Parallel,
        }
    }
}

impl SolverParams {
    /// Kernel support radius 2h.
    #[inline]
    pub fn support_radius(&self) -> f32 {
        2.0 * self.smoothing_length
    }

    /// Regularizer eps^2 = 0.01 h^2 for the Laplacian operators.
    #[inline]
    pub fn viscosity_epsilon_sq(&self) -> f32 {
        0.01 * self.smoothing_length * self.smoothing_length
    }

    /// Equation of state for these parameters.
    pub fn eos(&self) -> TaitEos {
        TaitEos::water(self.rest_density, self.speed_of_sound)
    }

    /// Check every parameter constraint. Called once before the solver starts.
    pub fn validate(&self) -> Result<(), SimError> {
        let h = self.smoothing_length;
        if !(h.is_finite() && h > 0.0) {
            return Err(SimError::config(format!(
                "smoothing_length must be positive, got {h}"
            )));
        }
        if !self.cell_size.is_finite() || self.cell_size < self.support_radius() {
            return Err(SimError::config(format!(
                "cell_size ({}) must be at least the kernel support radius 2h ({})",
                self.cell_size,
                self.support_radius()
            )));
        }
        for k in 0..3 {
            let (lo, hi) = (self.domain.min[k], self.domain.max[k]);
            if !(lo.is_finite() && hi.is_finite()) || lo >= hi {
                return Err(SimError::config(format!(
                    "domain bounds inverted or degenerate on axis {k}: min {lo}, max {hi}"
                )));
            }
        }
        let dims = NeighborGrid::dims_for(self.cell_size, self.domain.min, self.domain.max);
        match NeighborGrid::cell_count(dims) {
            Some(cells) if cells <= MAX_GRID_CELLS => {}
            _ => {
                return Err(SimError::config(format!(
                    "neighbor grid of {dims:?} cells exceeds the limit of {MAX_GRID_CELLS} cells; \
                     increase cell_size or shrink the domain"
                )))
            }
        }
        if !(self.rest_density.is_finite() && self.rest_density > 0.0) {
            return Err(SimError::config("rest_density must be positive"));
        }
        if !(self.speed_of_sound.is_finite() && self.speed_of_sound > 0.0) {
            return Err(SimError::config("speed_of_sound must be positive"));
        }
        if !(self.viscosity.is_finite() && self.viscosity >= 0.0) {
            return Err(SimError::config("viscosity must be non-negative"));
        }
        if !self.gravity.iter().all(|g| g.is_finite()) {
            return Err(SimError::config("gravity must be finite"));
        }
        if !(self.cfl_number > 0.0 && self.cfl_number <= 1.0) {
            return Err(SimError::config(format!(
                "cfl_number must be in (0, 1], got {}",
                self.cfl_number
            )));
        }
        if !(self.min_timestep.is_finite() && self.min_timestep > 0.0) {
            return Err(SimError::config("min_timestep must be positive"));
        }
        if !self.max_timestep.is_finite() || self.min_timestep > self.max_timestep {
            return Err(SimError::config(format!(
                "min_timestep ({}) must not exceed max_timestep ({})",
                self.min_timestep, self.max_timestep
            )));
        }
        if !(self.diffusion_coefficient.is_finite() && self.diffusion_coefficient >= 0.0) {
            return Err(SimError::config("diffusion_coefficient must be non-negative"));
        }
        if !(self.restitution >= 0.0 && self.restitution < 1.0) {
            return Err(SimError::config(format!(
                "restitution must be in [0, 1), got {}",
                self.restitution
            )));
        }
        if self.max_neighbors == 0 {
            return Err(SimError::config("max_neighbors must be at least 1"));
        }
        if let Some(rho_w) = self.waste_density {
            if !(rho_w.is_finite() && rho_w > 0.0) {
                return Err(SimError::config("waste_density must be positive"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let p = SolverParams::default();
        p.validate().unwrap();
        assert!((p.smoothing_length - 0.06).abs() < 1.0e-7);
        assert!((p.support_radius() - 0.12).abs() < 1.0e-7);
        assert!((p.viscosity_epsilon_sq() - 0.01 * 0.06 * 0.06).abs() < 1.0e-9);
    }

    #[test]
    fn rejects_cell_smaller_than_support() {
        let p = SolverParams {
            cell_size: 0.1,
            ..SolverParams::default()
        };
        let err = p.validate().unwrap_err();
        assert!(matches!(err, SimError::Configuration(_)));
        assert!(err.to_string().contains("cell_size"), "{err}");
    }

    #[test]
    fn rejects_inverted_bounds() {
        let p = SolverParams {
            domain: Aabb::new([0.0, 1.0, 0.0], [1.0, 0.5, 1.0]),
            ..SolverParams::default()
        };
        let err = p.validate().unwrap_err();
        assert!(err.to_string().contains("axis 1"), "{err}");
    }

    #[test]
    fn rejects_oversized_grid() {
        // 1000 m box at 0.12 m cells is ~5.8e11 cells
        let p = SolverParams {
            domain: Aabb::new([0.0; 3], [1000.0; 3]),
            ..SolverParams::default()
        };
        let err = p.validate().unwrap_err();
        assert!(matches!(err, SimError::Configuration(_)));
        assert!(err.to_string().contains("cells"), "{err}");

        let coarse = SolverParams {
            cell_size: 20.0,
            ..p
        };
        coarse.validate().unwrap();
    }

    #[test]
    fn rejects_bad_scalars() {
        let cases = [
            SolverParams { smoothing_length: 0.0, ..SolverParams::default() },
            SolverParams { rest_density: -1.0, ..SolverParams::default() },
            SolverParams { speed_of_sound: 0.0, ..SolverParams::default() },
            SolverParams { viscosity: -0.1, ..SolverParams::default() },
            SolverParams { cfl_number: 1.5, ..SolverParams::default() },
            SolverParams { cfl_number: 0.0, ..SolverParams::default() },
            SolverParams { min_timestep: 1.0e-2, ..SolverParams::default() },
            SolverParams { restitution: 1.0, ..SolverParams::default() },
            SolverParams { diffusion_coefficient: -1.0, ..SolverParams::default() },
            SolverParams { max_neighbors: 0, ..SolverParams::default() },
            SolverParams { waste_density: Some(0.0), ..SolverParams::default() },
            SolverParams { gravity: [0.0, f32::NAN, 0.0], ..SolverParams::default() },
        ];
        for p in cases {
            assert!(p.validate().is_err(), "should reject {p:?}");
        }
    }

    #[test]
    fn aabb_helpers() {
        let b = Aabb::new([0.0, 0.0, 0.0], [2.0, 1.0, 1.0]);
        assert_eq!(b.extent(), [2.0, 1.0, 1.0]);
        assert_eq!(b.center(), [1.0, 0.5, 0.5]);
        assert_eq!(b.volume(), 2.0);
        assert!(b.contains([2.0, 1.0, 0.0]));
        assert!(!b.contains([2.0001, 0.5, 0.5]));
        assert!(!b.contains([f32::NAN, 0.5, 0.5]));
    }
}
