//! Reflective axis-aligned box boundary.
//!
//! Applied after integration and before the next density pass. A particle
//! that left the box is clamped back onto the violated face and its normal
//! velocity component is reflected and damped by the restitution coefficient.

use crate::params::Aabb;
use crate::particle::ParticleArrays;

/// Clamp one coordinate into `[lo, hi]` and reflect its velocity component.
///
/// The velocity is only flipped while it still points out of the box, so a
/// particle already moving back inside is not pushed out again.
#[inline]
fn reflect_axis(pos: &mut f32, vel: &mut f32, lo: f32, hi: f32, restitution: f32) {
    if *pos < lo {
        *pos = lo;
        if *vel < 0.0 {
            *vel = -restitution * *vel;
        }
    } else if *pos > hi {
        *pos = hi;
        if *vel > 0.0 {
            *vel = -restitution * *vel;
        }
    }
}

/// Enforce the box on every particle.
///
/// NaN coordinates fail every comparison and are left untouched, so a
/// diverged state is still visible to the instability check afterwards.
pub fn enforce_box(particles: &mut ParticleArrays, domain: &Aabb, restitution: f32) {
    let [xmin, ymin, zmin] = domain.min;
    let [xmax, ymax, zmax] = domain.max;
    for i in 0..particles.len() {
        reflect_axis(&mut particles.x[i], &mut particles.vx[i], xmin, xmax, restitution);
        reflect_axis(&mut particles.y[i], &mut particles.vy[i], ymin, ymax, restitution);
        reflect_axis(&mut particles.z[i], &mut particles.vz[i], zmin, zmax, restitution);
    }
}
