use abp_common::{SimParams, Snapshot, Vec3};
use crate::error::{Result, SimError};
use rand::distr::Uniform;
use rand::prelude::*;
use rand_distr::StandardNormal;

/// Positions and orientations of every particle, one entry per particle in each vector.
///
/// The ensemble is allocated once and never resized during a run. Orientation vectors
/// are kept at unit length by every operation that writes them.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleState {
    // Positions
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    // Orientations
    pub ex: Vec<f64>,
    pub ey: Vec<f64>,
    pub ez: Vec<f64>,
}

impl ParticleState {
    /// Creates `n` particles at the origin, all pointing along +z.
    pub fn new(n: usize) -> Self {
        Self {
            x: vec![0.0; n],
            y: vec![0.0; n],
            z: vec![0.0; n],
            ex: vec![0.0; n],
            ey: vec![0.0; n],
            ez: vec![1.0; n],
        }
    }

    /// Builds an ensemble from explicit per-particle vectors. Orientations are normalized.
    pub fn from_vectors(positions: &[[f64; 3]], orientations: &[[f64; 3]]) -> Result<Self> {
        if positions.len() != orientations.len() {
            return Err(SimError::LengthMismatch { expected: positions.len(), found: orientations.len() });
        }
        let mut state = Self::new(positions.len());
        for (idx, (p, e)) in positions.iter().zip(orientations).enumerate() {
            state.set_position(idx, Vec3::from(*p));
            state.set_orientation(idx, Vec3::from(*e))?;
        }
        Ok(state)
    }

    /// Draws a fresh ensemble: isotropic orientations and positions from `placement`.
    pub fn random<R: Rng + ?Sized>(n: usize, placement: &Placement, rng: &mut R) -> Self {
        let mut state = Self::new(n);
        for idx in 0..n {
            let e = random_unit_vector(rng);
            state.ex[idx] = e.x;
            state.ey[idx] = e.y;
            state.ez[idx] = e.z;
        }
        for idx in 0..n {
            let (x, y) = placement.sample_xy(rng);
            state.x[idx] = x;
            state.y[idx] = y;
            state.z[idx] = placement.sample_z(rng);
        }
        state
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    #[inline]
    pub fn position(&self, idx: usize) -> Vec3 {
        Vec3::new(self.x[idx], self.y[idx], self.z[idx])
    }

    #[inline]
    pub fn orientation(&self, idx: usize) -> Vec3 {
        Vec3::new(self.ex[idx], self.ey[idx], self.ez[idx])
    }

    pub fn set_position(&mut self, idx: usize, p: Vec3) {
        self.x[idx] = p.x;
        self.y[idx] = p.y;
        self.z[idx] = p.z;
    }

    /// Stores the normalized direction of `e`. A zero vector has no direction and is refused.
    pub fn set_orientation(&mut self, idx: usize, e: Vec3) -> Result<()> {
        let unit = e.try_normalize().ok_or_else(|| {
            SimError::Config(abp_common::ConfigError::Invalid {
                field: "orientation",
                reason: format!("particle {idx} has a zero-length orientation"),
            })
        })?;
        self.ex[idx] = unit.x;
        self.ey[idx] = unit.y;
        self.ez[idx] = unit.z;
        Ok(())
    }

    /// Verifies that the six buffers still describe the same number of particles.
    pub fn check_consistent(&self) -> Result<()> {
        let n = self.x.len();
        for len in [self.y.len(), self.z.len(), self.ex.len(), self.ey.len(), self.ez.len()] {
            if len != n {
                return Err(SimError::LengthMismatch { expected: n, found: len });
            }
        }
        Ok(())
    }

    /// Copies the current state into a serializable frame.
    pub fn snapshot(&self, step: u32, delta: f64) -> Snapshot {
        Snapshot {
            step,
            time: step as f64 * delta,
            x: self.x.clone(),
            y: self.y.clone(),
            z: self.z.clone(),
            ex: self.ex.clone(),
            ey: self.ey.clone(),
            ez: self.ez.clone(),
        }
    }
}

/// Uniform placement inside the cylinder, used for the initial draw and for overlap redraws.
///
/// `(x, y)` is uniform on the disk of radius `wall_radius` (rejection from the enclosing
/// square), `z` is uniform on `[-height_l, height_l]`.
#[derive(Debug, Clone)]
pub struct Placement {
    wall_radius: f64,
    xy: Uniform<f64>,
    z: Uniform<f64>,
}

impl Placement {
    pub fn new(wall_radius: f64, height_l: f64) -> Result<Self> {
        let xy = Uniform::new_inclusive(-wall_radius, wall_radius)
            .map_err(|e| invalid_placement("confinement.wall_radius", e))?;
        let z = Uniform::new_inclusive(-height_l, height_l)
            .map_err(|e| invalid_placement("confinement.height", e))?;
        Ok(Self { wall_radius, xy, z })
    }

    pub fn from_params(params: &SimParams) -> Result<Self> {
        Self::new(params.wall_radius, params.height_l)
    }

    /// Draws `(x, y)` uniformly on the disk.
    pub fn sample_xy<R: Rng + ?Sized>(&self, rng: &mut R) -> (f64, f64) {
        let wall_sq = self.wall_radius * self.wall_radius;
        loop {
            let x = rng.sample(&self.xy);
            let y = rng.sample(&self.xy);
            if x * x + y * y <= wall_sq {
                return (x, y);
            }
        }
    }

    pub fn sample_z<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        rng.sample(&self.z)
    }
}

fn invalid_placement(field: &'static str, e: rand::distr::uniform::Error) -> SimError {
    SimError::Config(abp_common::ConfigError::Invalid { field, reason: format!("cannot build placement range: {e}") })
}

/// Isotropic unit vector from three normalized standard-normal draws.
pub fn random_unit_vector<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    loop {
        let v = Vec3::new(
            rng.sample(StandardNormal),
            rng.sample(StandardNormal),
            rng.sample(StandardNormal),
        );
        if let Some(unit) = v.try_normalize() {
            return unit;
        }
    }
}
