//! Force accumulation: symmetric pressure gradient, Morris viscosity,
//! gravity, and buoyancy of the waste phase.
//!
//! Every function here computes accelerations (force per unit mass). Density
//! and pressure must be current before any of them is called.

use crate::neighbor::NeighborList;
use crate::parallel::Dispatch;
use crate::params::SolverParams;
use crate::particle::{ParticleArrays, ParticleKind};
use crate::sph::cubic_spline_gradient;

/// Displacement `r_i - r_j`, its length and the kernel gradient for one pair.
#[inline]
fn pair(p: &ParticleArrays, i: usize, j: usize, h: f32) -> ([f32; 3], f32, (f32, f32, f32)) {
    let dx = p.x[i] - p.x[j];
    let dy = p.y[i] - p.y[j];
    let dz = p.z[i] - p.z[j];
    let r = (dx * dx + dy * dy + dz * dz).sqrt();
    ([dx, dy, dz], r, cubic_spline_gradient(dx, dy, dz, r, h))
}

// ---------------------------------------------------------------------------
// Pressure
// ---------------------------------------------------------------------------

/// Symmetric SPH pressure acceleration on particle `i`.
///
/// ```text
/// a_i = -sum_j m_j * (P_i/rho_i^2 + P_j/rho_j^2) * grad_W(r_ij, h)
/// ```
///
/// The bracket is symmetric in (i, j) and the gradient antisymmetric, so
/// `m_i a_i(j) == -m_j a_j(i)` for every pair and the total pressure force
/// over a closed set vanishes.
pub fn pressure_acceleration(
    particles: &ParticleArrays,
    neighbors: &NeighborList,
    h: f32,
    i: usize,
) -> [f32; 3] {
    let p = particles;
    let pi_over_rho2 = p.pressure[i] / (p.density[i] * p.density[i]);
    let mut acc = [0.0f32; 3];
    for &j in neighbors.neighbors(i) {
        let j = j as usize;
        let (_, _, (gx, gy, gz)) = pair(p, i, j, h);
        let pj_over_rho2 = p.pressure[j] / (p.density[j] * p.density[j]);
        let factor = -p.mass[j] * (pi_over_rho2 + pj_over_rho2);
        acc[0] += factor * gx;
        acc[1] += factor * gy;
        acc[2] += factor * gz;
    }
    acc
}

/// Pressure accelerations for every particle.
pub fn compute_pressure_accelerations(
    particles: &ParticleArrays,
    neighbors: &NeighborList,
    h: f32,
    dispatch: Dispatch,
) -> Vec<[f32; 3]> {
    dispatch.map(particles.len(), |i| pressure_acceleration(particles, neighbors, h, i))
}

// ---------------------------------------------------------------------------
// Viscosity
// ---------------------------------------------------------------------------

/// Morris (1997) laminar viscosity acceleration on particle `i`.
///
/// ```text
/// a_i = mu * sum_j (m_j / rho_j) * (v_i - v_j) * 2 (r_ij . grad_W) / (|r_ij|^2 + eps^2)
/// ```
///
/// `r_ij . grad_W <= 0` inside the support, so each pair term pulls `v_i`
/// toward `v_j`. `eps2` is the 0.01 h^2 regularizer.
pub fn viscous_acceleration(
    particles: &ParticleArrays,
    neighbors: &NeighborList,
    h: f32,
    viscosity: f32,
    eps2: f32,
    i: usize,
) -> [f32; 3] {
    let p = particles;
    let mut acc = [0.0f32; 3];
    for &j in neighbors.neighbors(i) {
        let j = j as usize;
        let ([dx, dy, dz], r, (gx, gy, gz)) = pair(p, i, j, h);
        let r_dot_grad = dx * gx + dy * gy + dz * gz;
        let factor = viscosity * (p.mass[j] / p.density[j]) * 2.0 * r_dot_grad / (r * r + eps2);
        acc[0] += factor * (p.vx[i] - p.vx[j]);
        acc[1] += factor * (p.vy[i] - p.vy[j]);
        acc[2] += factor * (p.vz[i] - p.vz[j]);
    }
    acc
}

// ---------------------------------------------------------------------------
// Body forces
// ---------------------------------------------------------------------------

/// Buoyancy of a waste particle relative to the surrounding fluid.
///
/// ```text
/// a_b = (1 - rho_i / rho_waste) * g
/// ```
///
/// A waste phase lighter than the local fluid rises; a heavier one sinks.
/// Clean particles get no buoyancy term.
#[inline]
pub fn buoyancy_acceleration(
    kind: ParticleKind,
    density: f32,
    waste_density: f32,
    gravity: [f32; 3],
) -> [f32; 3] {
    match kind {
        ParticleKind::Clean => [0.0; 3],
        ParticleKind::Waste => {
            let s = 1.0 - density / waste_density;
            [s * gravity[0], s * gravity[1], s * gravity[2]]
        }
    }
}

/// Compute the total acceleration of every particle and store it in
/// `ax`/`ay`/`az`: pressure + viscosity + gravity (+ buoyancy for waste
/// particles when a waste density is configured).
pub fn compute_accelerations(
    particles: &mut ParticleArrays,
    neighbors: &NeighborList,
    params: &SolverParams,
    dispatch: Dispatch,
) {
    let h = params.smoothing_length;
    let eps2 = params.viscosity_epsilon_sq();
    let g = params.gravity;
    let buoyancy = if params.track_concentration {
        params.waste_density
    } else {
        None
    };
    let p = &*particles;

    let acc = dispatch.map(p.len(), |i| {
        let ap = pressure_acceleration(p, neighbors, h, i);
        let av = viscous_acceleration(p, neighbors, h, params.viscosity, eps2, i);
        let mut a = [
            ap[0] + av[0] + g[0],
            ap[1] + av[1] + g[1],
            ap[2] + av[2] + g[2],
        ];
        if let Some(rho_w) = buoyancy {
            let ab = buoyancy_acceleration(p.kind[i], p.density[i], rho_w, g);
            a[0] += ab[0];
            a[1] += ab[1];
            a[2] += ab[2];
        }
        a
    });

    for (i, a) in acc.into_iter().enumerate() {
        particles.ax[i] = a[0];
        particles.ay[i] = a[1];
        particles.az[i] = a[2];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neighbor::NeighborGrid;

    fn neighbor_list(p: &ParticleArrays, h: f32) -> NeighborList {
        let mut grid = NeighborGrid::new(2.0 * h, [0.0; 3], [1.0; 3]);
        grid.update(&p.x, &p.y, &p.z);
        let mut list = NeighborList::new(32);
        list.build(&grid, &p.x, &p.y, &p.z, 2.0 * h, Dispatch::Serial);
        list
    }

    #[test]
    fn pressure_pair_is_equal_and_opposite() {
        let h = 0.06;
        let mut p = ParticleArrays::new();
        p.push_particle(0.50, 0.50, 0.50, 0.2, 1000.0);
        p.push_particle(0.55, 0.52, 0.49, 0.1, 1000.0);
        p.density = vec![1040.0, 1010.0];
        p.pressure = vec![5.0e5, 1.0e5];
        let list = neighbor_list(&p, h);

        let a0 = pressure_acceleration(&p, &list, h, 0);
        let a1 = pressure_acceleration(&p, &list, h, 1);
        for k in 0..3 {
            let f0 = p.mass[0] * a0[k];
            let f1 = p.mass[1] * a1[k];
            assert!(
                (f0 + f1).abs() <= 1.0e-6 * f0.abs().max(1.0),
                "axis {k}: forces {f0} and {f1} should cancel"
            );
        }
        // Compressed pair pushes apart: particle 0 is at smaller x
        assert!(a0[0] < 0.0 && a1[0] > 0.0);
    }

    #[test]
    fn viscosity_damps_relative_velocity() {
        let h = 0.06;
        let mut p = ParticleArrays::new();
        p.push_particle(0.50, 0.5, 0.5, 0.125, 1000.0);
        p.push_particle(0.55, 0.5, 0.5, 0.125, 1000.0);
        p.vy[0] = 1.0;
        let list = neighbor_list(&p, h);
        let a0 = viscous_acceleration(&p, &list, h, 0.5, 0.01 * h * h, 0);
        let a1 = viscous_acceleration(&p, &list, h, 0.5, 0.01 * h * h, 1);
        // Particle 0 is slowed, particle 1 dragged along
        assert!(a0[1] < 0.0, "a0 = {a0:?}");
        assert!(a1[1] > 0.0, "a1 = {a1:?}");
        assert_eq!(a0[0], 0.0);
    }

    #[test]
    fn no_interaction_beyond_support() {
        let h = 0.06;
        let mut p = ParticleArrays::new();
        p.push_particle(0.2, 0.5, 0.5, 0.125, 1000.0);
        p.push_particle(0.2 + 2.5 * h, 0.5, 0.5, 0.125, 1000.0);
        p.pressure = vec![1.0e5, 1.0e5];
        p.vx[1] = 3.0;
        let list = neighbor_list(&p, h);
        assert_eq!(pressure_acceleration(&p, &list, h, 0), [0.0; 3]);
        assert_eq!(viscous_acceleration(&p, &list, h, 0.5, 0.01 * h * h, 0), [0.0; 3]);
    }

    #[test]
    fn buoyancy_signs() {
        let g = [0.0, -9.81, 0.0];
        // Light waste (oil) rises
        let up = buoyancy_acceleration(ParticleKind::Waste, 1000.0, 900.0, g);
        assert!(up[1] > 0.0);
        // Heavy waste sinks
        let down = buoyancy_acceleration(ParticleKind::Waste, 1000.0, 1200.0, g);
        assert!(down[1] < 0.0);
        // Clean water is unaffected
        assert_eq!(buoyancy_acceleration(ParticleKind::Clean, 1000.0, 900.0, g), [0.0; 3]);
    }

    #[test]
    fn isolated_particle_feels_only_gravity() {
        let params = SolverParams::default();
        let mut p = ParticleArrays::new();
        p.push_particle(0.5, 0.5, 0.5, 0.125, 1000.0);
        p.pressure[0] = 1.0e4;
        let list = neighbor_list(&p, params.smoothing_length);
        compute_accelerations(&mut p, &list, &params, Dispatch::Serial);
        assert_eq!([p.ax[0], p.ay[0], p.az[0]], params.gravity);
    }

    #[test]
    fn buoyancy_only_when_tracking() {
        let mut params = SolverParams {
            waste_density: Some(800.0),
            ..SolverParams::default()
        };
        let mut p = ParticleArrays::new();
        p.push_particle(0.5, 0.5, 0.5, 0.125, 1000.0);
        p.mark_waste(0);
        let list = neighbor_list(&p, params.smoothing_length);

        compute_accelerations(&mut p, &list, &params, Dispatch::Serial);
        assert_eq!(p.ay[0], params.gravity[1]);

        params.track_concentration = true;
        compute_accelerations(&mut p, &list, &params, Dispatch::Serial);
        // (1 - 1000/800) * g + g = -0.25 g + g = 0.75 g
        let expected = 0.75 * params.gravity[1];
        assert!((p.ay[0] - expected).abs() < 1.0e-5, "ay = {}", p.ay[0]);
    }
}
