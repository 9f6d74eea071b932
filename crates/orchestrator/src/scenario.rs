//! Preset waste distributions
//!
//! A scenario decides which particles of the initial layout start out as
//! waste (concentration 1). Everything else starts clean.

use serde::{Deserialize, Serialize};
use sph_kernel::{Aabb, ParticleArrays, SimError};
use std::fmt;
use std::str::FromStr;

/// Share of the particles marked by the height-based scenarios.
pub const LAYER_FRACTION: f32 = 0.15;

/// Point-source radius as a fraction of the box's mean edge length.
pub const POINT_SOURCE_RADIUS_FRACTION: f32 = 0.25;

/// Initial waste distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WasteScenario {
    /// Light waste along the bottom of the fluid; rises when buoyancy is on
    OilSpill,
    /// Dense waste along the top of the fluid; sinks when buoyancy is on
    HeavyContamination,
    /// Waste in a ball around the box centre; spreads radially
    PointSource,
}

impl WasteScenario {
    /// All scenarios, in listing order
    pub const ALL: [WasteScenario; 3] = [
        WasteScenario::OilSpill,
        WasteScenario::HeavyContamination,
        WasteScenario::PointSource,
    ];

    /// Identifier used in config files and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            WasteScenario::OilSpill => "oil_spill",
            WasteScenario::HeavyContamination => "heavy_contamination",
            WasteScenario::PointSource => "point_source",
        }
    }

    /// Display name
    pub fn title(&self) -> &'static str {
        match self {
            WasteScenario::OilSpill => "Oil Spill",
            WasteScenario::HeavyContamination => "Heavy Contamination",
            WasteScenario::PointSource => "Point Source",
        }
    }

    /// One-line description
    pub fn description(&self) -> &'static str {
        match self {
            WasteScenario::OilSpill => {
                "Oil (900 kg/m^3) injected at the bottom, rises upward due to buoyancy"
            }
            WasteScenario::HeavyContamination => {
                "Heavy waste (1100 kg/m^3) injected at the top, sinks due to gravity"
            }
            WasteScenario::PointSource => {
                "Contamination injected at the box centre, spreads radially"
            }
        }
    }

    /// Waste density the scenario is meant to be run with, if any
    pub fn waste_density(&self) -> Option<f32> {
        match self {
            WasteScenario::OilSpill => Some(900.0),
            WasteScenario::HeavyContamination => Some(1100.0),
            WasteScenario::PointSource => None,
        }
    }

    /// Mark the scenario's particles as waste. Returns how many were marked.
    pub fn apply(&self, particles: &mut ParticleArrays, domain: &Aabb) -> usize {
        let selected = match self {
            WasteScenario::OilSpill => lowest_by_height(particles, layer_count(particles.len())),
            WasteScenario::HeavyContamination => {
                let n = layer_count(particles.len());
                let mut order = height_order(particles);
                order.split_off(order.len() - n)
            }
            WasteScenario::PointSource => within_radius(particles, domain),
        };

        for &i in &selected {
            particles.mark_waste(i);
        }

        tracing::info!(
            scenario = self.as_str(),
            waste = selected.len(),
            particles = particles.len(),
            "{}: {}",
            self.title(),
            self.description()
        );
        selected.len()
    }
}

impl fmt::Display for WasteScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WasteScenario {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WasteScenario::ALL
            .into_iter()
            .find(|sc| sc.as_str() == s)
            .ok_or_else(|| {
                let available: Vec<&str> = WasteScenario::ALL.iter().map(|sc| sc.as_str()).collect();
                SimError::config(format!(
                    "unknown scenario '{}'; available: {}",
                    s,
                    available.join(", ")
                ))
            })
    }
}

fn layer_count(n: usize) -> usize {
    (LAYER_FRACTION * n as f32) as usize
}

/// Particle indices sorted by height, lowest first. Ties keep index order.
fn height_order(particles: &ParticleArrays) -> Vec<usize> {
    let mut order: Vec<usize> = (0..particles.len()).collect();
    order.sort_by(|&a, &b| particles.y[a].total_cmp(&particles.y[b]));
    order
}

fn lowest_by_height(particles: &ParticleArrays, n: usize) -> Vec<usize> {
    let mut order = height_order(particles);
    order.truncate(n);
    order
}

fn within_radius(particles: &ParticleArrays, domain: &Aabb) -> Vec<usize> {
    let e = domain.extent();
    let diagonal = (e[0] * e[0] + e[1] * e[1] + e[2] * e[2]).sqrt();
    let radius = POINT_SOURCE_RADIUS_FRACTION * diagonal / 3.0f32.sqrt();
    let r2 = radius * radius;
    let c = domain.center();

    (0..particles.len())
        .filter(|&i| {
            let dx = particles.x[i] - c[0];
            let dy = particles.y[i] - c[1];
            let dz = particles.z[i] - c[2];
            dx * dx + dy * dy + dz * dz < r2
        })
        .collect()
}
