//! Concentration analytics computed from snapshots
//!
//! Mixing index: `1 - sqrt(var / 0.25)`, where 0.25 is the variance of a
//! fully segregated 50/50 binary field. 0 means unmixed, 1 means uniform.

use serde::Serialize;
use sph_kernel::Snapshot;

/// Variance of a fully segregated binary (0/1) concentration field.
pub const UNMIXED_VARIANCE: f64 = 0.25;

/// Lower concentration bounds of the low / medium / high zones.
pub const ZONE_THRESHOLDS: [f32; 3] = [0.1, 0.5, 0.9];

/// Particles at or above one concentration threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ContaminationZone {
    /// Lower concentration bound
    pub threshold: f32,
    /// Particles with `C >= threshold`
    pub particle_count: usize,
    /// Volume represented by those particles (m^3)
    pub volume: f64,
    /// Share of the box volume (%)
    pub percentage: f64,
}

/// Summary statistics of the concentration field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConcentrationStatistics {
    /// Simulated time of the snapshot (s)
    pub time: f64,
    /// Mean concentration
    pub mean: f64,
    /// Smallest concentration
    pub min: f64,
    /// Largest concentration
    pub max: f64,
    /// Population variance
    pub variance: f64,
    /// Mixing index in [0, 1]
    pub mixing_index: f64,
    /// Total waste mass `sum_i C_i m_i` (kg)
    pub waste_mass: f64,
    /// Waste-mass-weighted centre; `None` when no waste is left
    pub center_of_mass: Option<[f64; 3]>,
    /// Low / medium / high contamination zones
    pub zones: [ContaminationZone; 3],
}

impl ConcentrationStatistics {
    /// Statistics of `snapshot`. Returns `None` for an empty snapshot or one
    /// taken without concentration tracking.
    ///
    /// `particle_volume` is the volume each particle stands for (spacing^3),
    /// `box_volume` the volume of the simulation box.
    pub fn from_snapshot(
        snapshot: &Snapshot,
        particle_volume: f64,
        box_volume: f64,
    ) -> Option<Self> {
        let conc = snapshot.concentrations.as_ref()?;
        if conc.is_empty() {
            return None;
        }
        let n = conc.len() as f64;

        let mut sum = 0.0f64;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut waste_mass = 0.0f64;
        let mut weighted = [0.0f64; 3];
        for (i, &c) in conc.iter().enumerate() {
            let c = c as f64;
            let cm = c * snapshot.masses[i] as f64;
            sum += c;
            min = min.min(c);
            max = max.max(c);
            waste_mass += cm;
            for k in 0..3 {
                weighted[k] += cm * snapshot.positions[i][k] as f64;
            }
        }
        let mean = sum / n;
        let variance = conc
            .iter()
            .map(|&c| {
                let d = c as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;

        let center_of_mass = (waste_mass > 1.0e-10).then(|| {
            [
                weighted[0] / waste_mass,
                weighted[1] / waste_mass,
                weighted[2] / waste_mass,
            ]
        });

        let zones = ZONE_THRESHOLDS.map(|threshold| {
            let particle_count = conc.iter().filter(|&&c| c >= threshold).count();
            let volume = particle_count as f64 * particle_volume;
            let percentage = if box_volume > 0.0 {
                100.0 * volume / box_volume
            } else {
                0.0
            };
            ContaminationZone {
                threshold,
                particle_count,
                volume,
                percentage,
            }
        });

        Some(Self {
            time: snapshot.time,
            mean,
            min,
            max,
            variance,
            mixing_index: mixing_index(variance),
            waste_mass,
            center_of_mass,
            zones,
        })
    }
}

/// `1 - sqrt(variance / 0.25)`, clamped to [0, 1].
pub fn mixing_index(variance: f64) -> f64 {
    (1.0 - (variance.max(0.0) / UNMIXED_VARIANCE).sqrt()).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(conc: Vec<f32>) -> Snapshot {
        let n = conc.len();
        Snapshot {
            time: 1.5,
            particle_count: n as u32,
            positions: (0..n).map(|i| [i as f32, 0.0, 0.0]).collect(),
            velocities: vec![[0.0; 3]; n],
            densities: vec![1000.0; n],
            pressures: vec![0.0; n],
            masses: vec![2.0; n],
            concentrations: Some(conc),
            concentration_gradients: Some(vec![[0.0; 3]; n]),
            ..Snapshot::default()
        }
    }

    #[test]
    fn test_untracked_or_empty_is_none() {
        let mut snap = snapshot(vec![0.5]);
        snap.concentrations = None;
        assert!(ConcentrationStatistics::from_snapshot(&snap, 1.0, 1.0).is_none());
        assert!(ConcentrationStatistics::from_snapshot(&snapshot(vec![]), 1.0, 1.0).is_none());
    }

    #[test]
    fn test_segregated_field_is_unmixed() {
        let stats =
            ConcentrationStatistics::from_snapshot(&snapshot(vec![0.0, 0.0, 1.0, 1.0]), 1.0, 8.0)
                .unwrap();
        assert!((stats.mean - 0.5).abs() < 1e-12);
        assert!((stats.variance - 0.25).abs() < 1e-12);
        assert!(stats.mixing_index.abs() < 1e-6);
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 1.0);
        assert!((stats.waste_mass - 4.0).abs() < 1e-12);
        // Waste sits at x = 2 and x = 3
        let com = stats.center_of_mass.unwrap();
        assert!((com[0] - 2.5).abs() < 1e-12);
        assert_eq!(stats.time, 1.5);
    }

    #[test]
    fn test_uniform_field_is_fully_mixed() {
        let stats =
            ConcentrationStatistics::from_snapshot(&snapshot(vec![0.3; 5]), 1.0, 1.0).unwrap();
        assert!(stats.variance.abs() < 1e-12);
        assert_eq!(stats.mixing_index, 1.0);
    }

    #[test]
    fn test_clean_field_has_no_center() {
        let stats =
            ConcentrationStatistics::from_snapshot(&snapshot(vec![0.0; 3]), 1.0, 1.0).unwrap();
        assert!(stats.center_of_mass.is_none());
        assert_eq!(stats.waste_mass, 0.0);
    }

    #[test]
    fn test_zones_are_nested() {
        let snap = snapshot(vec![0.05, 0.2, 0.6, 0.95]);
        let stats = ConcentrationStatistics::from_snapshot(&snap, 0.5, 4.0).unwrap();
        let counts: Vec<usize> = stats.zones.iter().map(|z| z.particle_count).collect();
        assert_eq!(counts, vec![3, 2, 1]);
        assert!((stats.zones[0].volume - 1.5).abs() < 1e-12);
        assert!((stats.zones[0].percentage - 37.5).abs() < 1e-9);
        assert_eq!(stats.zones[2].threshold, 0.9);
    }

    #[test]
    fn test_mixing_index_clamped() {
        assert_eq!(mixing_index(1.0), 0.0);
        assert_eq!(mixing_index(0.0), 1.0);
        assert!((mixing_index(0.0625) - 0.5).abs() < 1e-12);
    }
}
