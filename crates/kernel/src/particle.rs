//! Particle data structures using struct-of-arrays layout for SIMD and
//! chunked parallel passes.

/// Particle kind discriminator.
///
/// Waste particles carry the contaminant at initialization and are the only
/// ones affected by the optional buoyancy term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum ParticleKind {
    /// Clean water
    Clean = 0,
    /// Water marked as carrying contaminant
    Waste = 1,
}

/// Struct-of-arrays particle storage.
///
/// All arrays are parallel: index `i` across every array refers to the same particle.
/// Separate x/y/z arrays (rather than Vec3) keep every pass a straight walk over
/// contiguous `f32` slices. Particle count is fixed once the solver is initialized.
#[derive(Debug, Clone, Default)]
pub struct ParticleArrays {
    // ---- Positions ----
    /// X positions (meters)
    pub x: Vec<f32>,
    /// Y positions (meters)
    pub y: Vec<f32>,
    /// Z positions (meters)
    pub z: Vec<f32>,

    // ---- Velocities ----
    /// X velocities (m/s)
    pub vx: Vec<f32>,
    /// Y velocities (m/s)
    pub vy: Vec<f32>,
    /// Z velocities (m/s)
    pub vz: Vec<f32>,

    // ---- Accelerations ----
    /// X accelerations (m/s^2)
    pub ax: Vec<f32>,
    /// Y accelerations (m/s^2)
    pub ay: Vec<f32>,
    /// Z accelerations (m/s^2)
    pub az: Vec<f32>,

    // ---- Scalar fields ----
    /// Density (kg/m^3)
    pub density: Vec<f32>,
    /// Pressure (Pa)
    pub pressure: Vec<f32>,
    /// Particle mass (kg)
    pub mass: Vec<f32>,
    /// Contaminant concentration in [0, 1]
    pub concentration: Vec<f32>,
    /// Particle kind tag
    pub kind: Vec<ParticleKind>,
}

impl ParticleArrays {
    /// Create an empty particle collection with no particles allocated.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty collection with room for `n` particles.
    pub fn with_capacity(n: usize) -> Self {
        Self {
            x: Vec::with_capacity(n),
            y: Vec::with_capacity(n),
            z: Vec::with_capacity(n),
            vx: Vec::with_capacity(n),
            vy: Vec::with_capacity(n),
            vz: Vec::with_capacity(n),
            ax: Vec::with_capacity(n),
            ay: Vec::with_capacity(n),
            az: Vec::with_capacity(n),
            density: Vec::with_capacity(n),
            pressure: Vec::with_capacity(n),
            mass: Vec::with_capacity(n),
            concentration: Vec::with_capacity(n),
            kind: Vec::with_capacity(n),
        }
    }

    /// Return the number of particles currently stored.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Return `true` if there are no particles.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Append a single clean particle at rest.
    ///
    /// Velocity, acceleration, pressure and concentration are initialized to zero.
    pub fn push_particle(&mut self, px: f32, py: f32, pz: f32, mass: f32, density: f32) {
        self.x.push(px);
        self.y.push(py);
        self.z.push(pz);
        self.vx.push(0.0);
        self.vy.push(0.0);
        self.vz.push(0.0);
        self.ax.push(0.0);
        self.ay.push(0.0);
        self.az.push(0.0);
        self.density.push(density);
        self.pressure.push(0.0);
        self.mass.push(mass);
        self.concentration.push(0.0);
        self.kind.push(ParticleKind::Clean);
    }

    /// Mark particle `i` as waste with full concentration.
    pub fn mark_waste(&mut self, i: usize) {
        self.concentration[i] = 1.0;
        self.kind[i] = ParticleKind::Waste;
    }

    /// Position of particle `i` as an array.
    #[inline]
    pub fn position(&self, i: usize) -> [f32; 3] {
        [self.x[i], self.y[i], self.z[i]]
    }

    /// Velocity of particle `i` as an array.
    #[inline]
    pub fn velocity(&self, i: usize) -> [f32; 3] {
        [self.vx[i], self.vy[i], self.vz[i]]
    }

    /// Speed |v| of particle `i`.
    #[inline]
    pub fn speed(&self, i: usize) -> f32 {
        (self.vx[i] * self.vx[i] + self.vy[i] * self.vy[i] + self.vz[i] * self.vz[i]).sqrt()
    }

    /// Acceleration magnitude |a| of particle `i`.
    #[inline]
    pub fn acceleration_magnitude(&self, i: usize) -> f32 {
        (self.ax[i] * self.ax[i] + self.ay[i] * self.ay[i] + self.az[i] * self.az[i]).sqrt()
    }

    /// Total linear momentum sum_i m_i v_i.
    pub fn momentum(&self) -> [f64; 3] {
        let mut p = [0.0_f64; 3];
        for i in 0..self.len() {
            let m = self.mass[i] as f64;
            p[0] += m * self.vx[i] as f64;
            p[1] += m * self.vy[i] as f64;
            p[2] += m * self.vz[i] as f64;
        }
        p
    }
}
