use serde::{Serialize, Deserialize};

/// Positions and orientations of every particle at a sampled step.
///
/// Stored column-wise, mirroring the engine's buffers, so the binary writer can
/// emit each component as one contiguous array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Index of the integration step after which the frame was taken.
    pub step: u32,
    /// Simulation time, `step * delta`.
    pub time: f64,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub ex: Vec<f64>,
    pub ey: Vec<f64>,
    pub ez: Vec<f64>,
}

impl Snapshot {
    pub fn particle_count(&self) -> usize {
        self.x.len()
    }

    /// Position of particle `idx` as `[x, y, z]`.
    pub fn position(&self, idx: usize) -> [f64; 3] {
        [self.x[idx], self.y[idx], self.z[idx]]
    }

    /// Orientation of particle `idx` as `[ex, ey, ez]`.
    pub fn orientation(&self, idx: usize) -> [f64; 3] {
        [self.ex[idx], self.ey[idx], self.ez[idx]]
    }
}
