use serde::{Deserialize, Serialize};
use crate::config::{OrientationNoise, PairPotential};

/// Simulation constants derived from the configuration, read once and used every step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    pub num_particles: u32,
    pub particle_diameter: f64, // L

    // Time & dynamics
    pub delta: f64,
    pub rotational_diffusion: f64,    // De
    pub translational_diffusion: f64, // Dt
    pub self_propulsion: f64,         // vs
    pub prefactor_orientation: f64,   // sqrt(2 delta De)
    pub prefactor_translation: f64,   // sqrt(2 delta Dt)
    pub orientation_noise: OrientationNoise,

    // Pair interaction
    pub potential: PairPotential,
    pub prefactor_interaction: f64,
    pub cutoff_radius: f64,
    pub cutoff_sq: f64,
    pub force_cap: f64,

    // Cylinder
    pub wall_radius: f64,
    pub half_height: f64,
    pub height_l: f64, // half_height - L/2
    pub min_separation: f64,

    // Sampling
    pub total_steps: u32,
    pub output_interval: u32,
}

impl SimParams {
    /// Number of frames a run samples: steps `t` with `t % output_interval == 0`.
    pub fn frame_count(&self) -> u32 {
        if self.output_interval == 0 {
            return 0;
        }
        self.total_steps.div_ceil(self.output_interval)
    }
}
