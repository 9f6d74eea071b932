//! Symplectic Euler integration and adaptive CFL timestep selection.

use crate::params::SolverParams;
use crate::particle::ParticleArrays;

/// Outcome of the timestep selection for one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimestepChoice {
    /// Timestep to integrate with (s).
    pub dt: f32,
    /// `false` if max |v| or max |a| was non-finite; `dt` is then the
    /// configured minimum.
    pub stable: bool,
}

/// Compute the adaptive timestep.
///
/// ```text
/// dt = CFL * min(h / (c_s + max|v|), sqrt(h / max|a|))
/// ```
///
/// clamped to `[min_timestep, max_timestep]`. The acceleration bound is
/// dropped when `max|a| == 0`. A non-finite `max_speed` or `max_accel`
/// selects `min_timestep` and marks the step unstable.
pub fn compute_timestep(max_speed: f32, max_accel: f32, params: &SolverParams) -> TimestepChoice {
    if !max_speed.is_finite() || !max_accel.is_finite() {
        return TimestepChoice {
            dt: params.min_timestep,
            stable: false,
        };
    }

    let h = params.smoothing_length;

    // 1. Acoustic CFL condition based on velocity + speed of sound
    let dt_cfl = h / (params.speed_of_sound + max_speed);

    // 2. Acceleration condition
    let dt_force = if max_accel > 0.0 {
        (h / max_accel).sqrt()
    } else {
        f32::INFINITY
    };

    let dt = params.cfl_number * dt_cfl.min(dt_force);
    TimestepChoice {
        dt: dt.clamp(params.min_timestep, params.max_timestep),
        stable: true,
    }
}

/// Advance velocities then positions by `dt` (semi-implicit Euler).
///
/// ```text
/// v(t + dt) = v(t) + a(t) * dt
/// x(t + dt) = x(t) + v(t + dt) * dt
/// ```
pub fn symplectic_euler(particles: &mut ParticleArrays, dt: f32) {
    for i in 0..particles.len() {
        particles.vx[i] += particles.ax[i] * dt;
        particles.vy[i] += particles.ay[i] * dt;
        particles.vz[i] += particles.az[i] * dt;

        particles.x[i] += particles.vx[i] * dt;
        particles.y[i] += particles.vy[i] * dt;
        particles.z[i] += particles.vz[i] * dt;
    }
}
