//! SPH smoothing kernel functions and the density / pressure passes.
//!
//! Implements the cubic B-spline kernel and its gradient for 3D SPH
//! simulations, with support radius 2h.

use std::f32::consts::PI;

use crate::eos::TaitEos;
use crate::neighbor::NeighborList;
use crate::parallel::Dispatch;
use crate::particle::ParticleArrays;

/// Below `GRADIENT_EPSILON * h` two particles are treated as coincident and
/// the kernel gradient is zero.
pub const GRADIENT_EPSILON: f32 = 1.0e-6;

/// Density floor as a fraction of rest density. Keeps density strictly
/// positive for isolated particles without masking NaN.
pub const DENSITY_FLOOR_FRACTION: f32 = 1.0e-3;

/// 3D normalization sigma_3 = 3 / (2 pi h^3) of the cubic spline.
#[inline]
fn cubic_spline_norm(h: f32) -> f32 {
    3.0 / (2.0 * PI * h * h * h)
}

/// Cubic B-spline smoothing kernel in 3D.
///
/// ```text
/// W(r, h) = sigma_3 * (2/3 - q^2 + q^3/2)   for 0 <= q < 1
/// W(r, h) = sigma_3 * (2 - q)^3 / 6         for 1 <= q < 2
/// W(r, h) = 0                               for q >= 2
/// ```
/// with `q = r/h` and `sigma_3 = 3 / (2 pi h^3)`.
///
/// # Arguments
/// * `r` - Distance between two particles (must be >= 0).
/// * `h` - Smoothing length. The support radius is 2h.
pub fn cubic_spline(r: f32, h: f32) -> f32 {
    let q = r / h;
    if q >= 2.0 {
        return 0.0;
    }
    let sigma = cubic_spline_norm(h);
    if q < 1.0 {
        sigma * (2.0 / 3.0 - q * q + 0.5 * q * q * q)
    } else {
        let t = 2.0 - q;
        sigma * t * t * t / 6.0
    }
}

/// Gradient of the cubic B-spline kernel in 3D.
///
/// Returns `(dW/dx, dW/dy, dW/dz)` for the displacement `(dx, dy, dz)` from
/// particle j to particle i and the pre-computed distance
/// `r = sqrt(dx^2 + dy^2 + dz^2)`.
///
/// ```text
/// nabla W = (dW/dr) * (r_vec / |r|)
/// dW/dr   = sigma_3 / h * (-2q + 3q^2/2)    for 0 <= q < 1
/// dW/dr   = sigma_3 / h * (-(2 - q)^2 / 2)  for 1 <= q < 2
/// ```
///
/// Returns the zero vector for coincident particles (`r <= GRADIENT_EPSILON * h`)
/// and outside the support. Flipping the displacement flips every component
/// exactly, so `gradW(r_ij) == -gradW(r_ji)` bit for bit.
pub fn cubic_spline_gradient(dx: f32, dy: f32, dz: f32, r: f32, h: f32) -> (f32, f32, f32) {
    let q = r / h;
    if q >= 2.0 || r <= GRADIENT_EPSILON * h {
        return (0.0, 0.0, 0.0);
    }
    let sigma_over_h = cubic_spline_norm(h) / h;
    let dw_dr = if q < 1.0 {
        sigma_over_h * (-2.0 * q + 1.5 * q * q)
    } else {
        let t = 2.0 - q;
        -0.5 * sigma_over_h * t * t
    };

    // gradient = dW/dr * (r_vec / |r|)
    let scale = dw_dr / r;
    (scale * dx, scale * dy, scale * dz)
}

// ---------------------------------------------------------------------------
// Density summation
// ---------------------------------------------------------------------------

/// Compute density for all particles using SPH summation.
///
/// ```text
/// rho_i = m_i * W(0, h) + sum_{j != i} m_j * W(|r_i - r_j|, h)
/// ```
///
/// Neighbor lists exclude the particle itself, so the self term is added
/// explicitly. The result is floored at `DENSITY_FLOOR_FRACTION * rest_density`.
pub fn compute_density(
    particles: &mut ParticleArrays,
    neighbors: &NeighborList,
    h: f32,
    rest_density: f32,
    dispatch: Dispatch,
) {
    let w0 = cubic_spline(0.0, h);
    let floor = DENSITY_FLOOR_FRACTION * rest_density;
    let p = &*particles;

    let density = dispatch.map(p.len(), |i| {
        let mut rho = p.mass[i] * w0;
        for &j in neighbors.neighbors(i) {
            let j = j as usize;
            let dx = p.x[i] - p.x[j];
            let dy = p.y[i] - p.y[j];
            let dz = p.z[i] - p.z[j];
            let r = (dx * dx + dy * dy + dz * dz).sqrt();
            rho += p.mass[j] * cubic_spline(r, h);
        }
        // NaN fails the comparison and passes through unchanged
        if rho < floor {
            floor
        } else {
            rho
        }
    });
    particles.density = density;
}

/// Compute pressure for all particles from the (clamped) Tait EOS.
pub fn compute_pressure(particles: &mut ParticleArrays, eos: &TaitEos, dispatch: Dispatch) {
    let density = &particles.density;
    let pressure = dispatch.map(density.len(), |i| eos.pressure(density[i]));
    particles.pressure = pressure;
}
