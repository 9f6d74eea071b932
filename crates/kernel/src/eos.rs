//! Equation of state for weakly-compressible SPH.
//!
//! Maps density to pressure with the Tait relation. All units are SI:
//! meters, kg, seconds, Pascals.

/// Tait equation exponent (gamma) for water, the standard WCSPH value.
pub const WATER_GAMMA: f32 = 7.0;

/// Tait equation of state for weakly-compressible liquid (WCSPH).
///
/// ```text
/// P = B * ((rho / rho0)^gamma - 1)
/// ```
/// where `B = rho0 * c_s^2 / gamma`.
///
/// # Arguments
/// * `density` - Current density rho (kg/m^3).
/// * `rest_density` - Reference rest density rho0 (kg/m^3).
/// * `speed_of_sound` - Numerical speed of sound c_s (m/s).
/// * `gamma` - Tait exponent (7 for water).
///
/// # Returns
/// Pressure in Pascals. Negative (tension) if `density < rest_density`;
/// see [`TaitEos::pressure`] for the clamped form the solver uses.
pub fn tait_eos(density: f32, rest_density: f32, speed_of_sound: f32, gamma: f32) -> f32 {
    let b = rest_density * speed_of_sound * speed_of_sound / gamma;
    let ratio = density / rest_density;
    b * (ratio.powf(gamma) - 1.0)
}

/// Tait EOS with its constants bound, as used by the pressure pass.
///
/// Tensile pressure is clamped to zero: a particle at or below rest density
/// exerts no pressure, which suppresses the tensile clumping instability at
/// free surfaces. The force pass consumes the clamped value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaitEos {
    /// Rest density rho0 (kg/m^3).
    pub rest_density: f32,
    /// Artificial speed of sound c_s (m/s).
    pub speed_of_sound: f32,
    /// Tait exponent.
    pub gamma: f32,
}

impl TaitEos {
    /// Water EOS (gamma = 7).
    pub fn water(rest_density: f32, speed_of_sound: f32) -> Self {
        Self {
            rest_density,
            speed_of_sound,
            gamma: WATER_GAMMA,
        }
    }

    /// Stiffness B = c_s^2 rho0 / gamma.
    pub fn stiffness(&self) -> f32 {
        self.speed_of_sound * self.speed_of_sound * self.rest_density / self.gamma
    }

    /// Pressure for `density`, clamped to be non-negative.
    ///
    /// NaN density yields NaN pressure so instability stays visible.
    #[inline]
    pub fn pressure(&self, density: f32) -> f32 {
        let p = tait_eos(density, self.rest_density, self.speed_of_sound, self.gamma);
        if p < 0.0 {
            0.0
        } else {
            p
        }
    }
}
