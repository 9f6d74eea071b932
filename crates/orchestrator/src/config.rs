//! Configuration parsing and validation for SPH simulations

use serde::{Deserialize, Serialize};
use sph_kernel::params::{DEFAULT_SMOOTHING_RATIO, DEFAULT_SPACING};
use sph_kernel::{Aabb, Dispatch, SimError, SolverParams};
use std::fs;
use std::path::Path;

use crate::scenario::WasteScenario;

/// Main simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Human-readable simulation name
    #[serde(default = "default_name")]
    pub name: String,
    /// Upper bound on the number of fluid particles
    #[serde(default = "default_particle_count")]
    pub particle_count: usize,
    /// Initial inter-particle distance (meters)
    #[serde(default = "default_spacing")]
    pub particle_spacing: f32,
    /// Smoothing length as a multiple of the particle spacing
    #[serde(default = "default_smoothing_ratio")]
    pub smoothing_ratio: f32,
    /// Neighbor grid cell size (meters); defaults to the support radius 2h
    #[serde(default)]
    pub cell_size: Option<f32>,
    /// Simulation box
    #[serde(default)]
    pub domain: Aabb,
    /// Fraction of the box (per axis) filled with fluid, anchored at `domain.min`
    #[serde(default = "default_fill_fraction")]
    pub fill_fraction: [f32; 3],
    /// Rest density (kg/m^3)
    #[serde(default = "default_rest_density")]
    pub rest_density: f32,
    /// Viscosity coefficient
    #[serde(default = "default_viscosity")]
    pub viscosity: f32,
    /// WCSPH speed of sound parameter
    #[serde(default = "default_speed_of_sound")]
    pub speed_of_sound: f32,
    /// Gravity vector (m/s^2)
    #[serde(default = "default_gravity")]
    pub gravity: [f32; 3],
    /// CFL condition for adaptive timestep
    #[serde(default = "default_cfl")]
    pub cfl_number: f32,
    /// Largest timestep the solver may take (seconds)
    #[serde(default = "default_max_timestep")]
    pub max_timestep: f32,
    /// Smallest timestep the solver may take (seconds)
    #[serde(default = "default_min_timestep")]
    pub min_timestep: f32,
    /// Contaminant diffusion coefficient (m^2/s)
    #[serde(default = "default_diffusion")]
    pub diffusion_coefficient: f32,
    /// Wall restitution coefficient
    #[serde(default = "default_restitution")]
    pub restitution: f32,
    /// Neighbor buffer capacity per particle
    #[serde(default = "default_max_neighbors")]
    pub max_neighbors: usize,
    /// Contaminant tracking; `None` runs a clean fluid
    #[serde(default)]
    pub tracking: Option<TrackingConfig>,
    /// Use the rayon thread pool for per-particle passes
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    /// Stop after this many timesteps
    #[serde(default)]
    pub max_timesteps: Option<u64>,
    /// Stop after this much simulated time (seconds)
    #[serde(default)]
    pub max_time: Option<f64>,
    /// Publish a snapshot every N steps
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval: u64,
}

/// Contaminant tracking settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Initial waste distribution
    pub scenario: WasteScenario,
    /// Density of the waste phase (kg/m^3); enables buoyancy when set.
    /// Falls back to the scenario's own density when omitted.
    #[serde(default)]
    pub waste_density: Option<f32>,
}

impl TrackingConfig {
    /// Waste density in effect: the explicit value, else the scenario's
    pub fn effective_waste_density(&self) -> Option<f32> {
        self.waste_density.or_else(|| self.scenario.waste_density())
    }
}

// Default values
fn default_name() -> String {
    "dam_break".to_string()
}

fn default_particle_count() -> usize {
    8000
}

fn default_spacing() -> f32 {
    DEFAULT_SPACING
}

fn default_smoothing_ratio() -> f32 {
    DEFAULT_SMOOTHING_RATIO
}

fn default_fill_fraction() -> [f32; 3] {
    [0.4, 0.5, 0.4]
}

fn default_rest_density() -> f32 {
    1000.0
}

fn default_viscosity() -> f32 {
    0.001
}

fn default_speed_of_sound() -> f32 {
    100.0
}

fn default_gravity() -> [f32; 3] {
    [0.0, -9.81, 0.0]
}

fn default_cfl() -> f32 {
    0.25
}

fn default_max_timestep() -> f32 {
    1.0e-3
}

fn default_min_timestep() -> f32 {
    1.0e-6
}

fn default_diffusion() -> f32 {
    1.0e-9
}

fn default_restitution() -> f32 {
    0.5
}

fn default_max_neighbors() -> usize {
    256
}

fn default_parallel() -> bool {
    true
}

fn default_snapshot_interval() -> u64 {
    10
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            particle_count: default_particle_count(),
            particle_spacing: default_spacing(),
            smoothing_ratio: default_smoothing_ratio(),
            cell_size: None,
            domain: Aabb::default(),
            fill_fraction: default_fill_fraction(),
            rest_density: default_rest_density(),
            viscosity: default_viscosity(),
            speed_of_sound: default_speed_of_sound(),
            gravity: default_gravity(),
            cfl_number: default_cfl(),
            max_timestep: default_max_timestep(),
            min_timestep: default_min_timestep(),
            diffusion_coefficient: default_diffusion(),
            restitution: default_restitution(),
            max_neighbors: default_max_neighbors(),
            tracking: None,
            parallel: default_parallel(),
            max_timesteps: None,
            max_time: None,
            snapshot_interval: default_snapshot_interval(),
        }
    }
}

impl SimulationConfig {
    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            SimError::config(format!("failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }

    /// Parse and validate a JSON document
    pub fn from_json(contents: &str) -> Result<Self, SimError> {
        let config: SimulationConfig = serde_json::from_str(contents)
            .map_err(|e| SimError::config(format!("failed to parse config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), SimError> {
        if self.particle_count == 0 {
            return Err(SimError::config("particle_count must be at least 1"));
        }

        if !(self.particle_spacing.is_finite() && self.particle_spacing > 0.0) {
            return Err(SimError::config("particle_spacing must be positive"));
        }

        if !(self.smoothing_ratio.is_finite() && self.smoothing_ratio > 0.0) {
            return Err(SimError::config("smoothing_ratio must be positive"));
        }

        for (k, &f) in self.fill_fraction.iter().enumerate() {
            if !(f > 0.0 && f <= 1.0) {
                return Err(SimError::config(format!(
                    "fill_fraction[{k}] must be in (0, 1], got {f}"
                )));
            }
        }

        if self.snapshot_interval == 0 {
            return Err(SimError::config("snapshot_interval must be at least 1"));
        }

        if let Some(max_timesteps) = self.max_timesteps {
            if max_timesteps == 0 {
                return Err(SimError::config("max_timesteps must be at least 1"));
            }
        }

        if let Some(max_time) = self.max_time {
            if !(max_time > 0.0) {
                return Err(SimError::config("max_time must be positive"));
            }
        }

        if let Some(rho) = self.tracking.as_ref().and_then(|t| t.waste_density) {
            if !(rho.is_finite() && rho > 0.0) {
                return Err(SimError::config("waste_density must be positive"));
            }
        }

        self.solver_params().validate()
    }

    /// Calculate smoothing length from particle spacing
    pub fn smoothing_length(&self) -> f32 {
        self.smoothing_ratio * self.particle_spacing
    }

    /// Solver parameter block derived from this configuration
    pub fn solver_params(&self) -> SolverParams {
        let h = self.smoothing_length();
        SolverParams {
            smoothing_length: h,
            cell_size: self.cell_size.unwrap_or(2.0 * h),
            rest_density: self.rest_density,
            speed_of_sound: self.speed_of_sound,
            viscosity: self.viscosity,
            gravity: self.gravity,
            cfl_number: self.cfl_number,
            max_timestep: self.max_timestep,
            min_timestep: self.min_timestep,
            diffusion_coefficient: self.diffusion_coefficient,
            restitution: self.restitution,
            domain: self.domain,
            max_neighbors: self.max_neighbors,
            track_concentration: self.tracking.is_some(),
            waste_density: self
                .tracking
                .as_ref()
                .and_then(TrackingConfig::effective_waste_density),
            dispatch: Dispatch::from_flag(self.parallel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoothing_length() {
        let config = SimulationConfig {
            particle_spacing: 0.01,
            ..SimulationConfig::default()
        };

        assert!((config.smoothing_length() - 0.012).abs() < 1e-6);
    }

    #[test]
    fn test_defaults_match_solver_defaults() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.solver_params(), SolverParams::default());
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = SimulationConfig::from_json("{}").unwrap();
        assert_eq!(config, SimulationConfig::default());
    }

    #[test]
    fn test_tracking_from_json() {
        let config = SimulationConfig::from_json(
            r#"{
                "name": "spill",
                "particle_count": 500,
                "tracking": { "scenario": "oil_spill", "waste_density": 900.0 },
                "max_timesteps": 50
            }"#,
        )
        .unwrap();

        assert_eq!(config.name, "spill");
        assert_eq!(config.max_timesteps, Some(50));
        let params = config.solver_params();
        assert!(params.track_concentration);
        assert_eq!(params.waste_density, Some(900.0));
        assert_eq!(
            config.tracking.map(|t| t.scenario),
            Some(WasteScenario::OilSpill)
        );
    }

    #[test]
    fn test_waste_density_defaults_from_scenario() {
        let density = |json: &str| {
            SimulationConfig::from_json(json)
                .unwrap()
                .solver_params()
                .waste_density
        };
        assert_eq!(density(r#"{ "tracking": { "scenario": "oil_spill" } }"#), Some(900.0));
        assert_eq!(
            density(r#"{ "tracking": { "scenario": "heavy_contamination" } }"#),
            Some(1100.0)
        );
        assert_eq!(density(r#"{ "tracking": { "scenario": "point_source" } }"#), None);
        // An explicit value wins over the scenario default
        assert_eq!(
            density(r#"{ "tracking": { "scenario": "oil_spill", "waste_density": 950.0 } }"#),
            Some(950.0)
        );
        assert_eq!(density("{}"), None);
    }

    #[test]
    fn test_unknown_scenario_rejected() {
        let err = SimulationConfig::from_json(r#"{ "tracking": { "scenario": "lava" } }"#)
            .unwrap_err();
        assert!(matches!(err, SimError::Configuration(_)));
    }

    #[test]
    fn test_validation_domain_bounds() {
        let mut config = SimulationConfig {
            domain: Aabb::new([1.0, 0.0, 0.0], [0.0, 1.0, 1.0]),
            ..SimulationConfig::default()
        };

        assert!(config.validate().is_err());

        config.domain = Aabb::new([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_particle_spacing() {
        let mut config = SimulationConfig {
            particle_spacing: -0.01,
            ..SimulationConfig::default()
        };

        assert!(config.validate().is_err());

        config.particle_spacing = 0.01;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_small_cell_size() {
        let config = SimulationConfig {
            cell_size: Some(0.05),
            ..SimulationConfig::default()
        };

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cell_size"), "got: {err}");
    }

    #[test]
    fn test_validation_stopping_conditions() {
        let mut config = SimulationConfig {
            max_timesteps: Some(0),
            ..SimulationConfig::default()
        };
        assert!(config.validate().is_err());

        config.max_timesteps = Some(1);
        config.max_time = Some(0.0);
        assert!(config.validate().is_err());

        config.max_time = Some(0.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_fill_fraction() {
        let config = SimulationConfig {
            fill_fraction: [0.4, 0.0, 0.4],
            ..SimulationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = SimulationConfig::load("/nonexistent/sph_config.json").unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
