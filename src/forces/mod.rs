//! Short-range pair forces.
//!
//! The net force on particle `k` is accumulated pair by pair along the separation
//! vector:
//!
//! ```text
//! F_k = Σ_{j≠k, R<r} min(a(R), cap) · (pos_k − pos_j)
//! ```
//!
//! with `a(R) = prefactor·(2/R¹⁴ − 1/R⁸)` for the Lennard-Jones form and
//! `a(R) = prefactor/R¹⁴` for the purely repulsive form. A positive coefficient
//! pushes `k` away from `j`. The integrator adds `F_k·δ` to the position.
//!
//! Every strategy in this module must reproduce the same formula, cutoff, cap and
//! pair-distance floor so that strategies can be swapped without changing the physics.

use abp_common::{Backend, PairPotential, SimParams};
use crate::ensemble::ParticleState;
use crate::error::{Result, SimError};
use log::{info, warn};

pub mod cpu;
#[cfg(feature = "gpu")]
pub mod gpu;

pub use cpu::ParallelCpuForces;
#[cfg(feature = "gpu")]
pub use gpu::WgpuForces;

/// Squared separations below this are evaluated at the floor. The coefficient there is
/// far above any sensible cap, so the floor only keeps `R¹⁴` away from zero.
pub const MIN_PAIR_DISTANCE_SQ: f64 = 1e-4;

/// Per-particle net force, one component per vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ForceField {
    pub fx: Vec<f64>,
    pub fy: Vec<f64>,
    pub fz: Vec<f64>,
}

impl ForceField {
    pub fn zeros(n: usize) -> Self {
        Self { fx: vec![0.0; n], fy: vec![0.0; n], fz: vec![0.0; n] }
    }

    pub fn len(&self) -> usize {
        self.fx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fx.is_empty()
    }

    pub fn clear(&mut self) {
        self.fx.iter_mut().for_each(|f| *f = 0.0);
        self.fy.iter_mut().for_each(|f| *f = 0.0);
        self.fz.iter_mut().for_each(|f| *f = 0.0);
    }

    pub fn check_len(&self, expected: usize) -> Result<()> {
        for len in [self.fx.len(), self.fy.len(), self.fz.len()] {
            if len != expected {
                return Err(SimError::LengthMismatch { expected, found: len });
            }
        }
        Ok(())
    }
}

/// Constants of the force pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceParams {
    pub potential: PairPotential,
    /// `48·ε` for Lennard-Jones, `24·ε` for the repulsive form.
    pub prefactor: f64,
    pub cutoff: f64,
    pub force_cap: f64,
}

impl ForceParams {
    pub fn from_params(params: &SimParams) -> Self {
        Self {
            potential: params.potential,
            prefactor: params.prefactor_interaction,
            cutoff: params.cutoff_radius,
            force_cap: params.force_cap,
        }
    }

    /// With a zero prefactor every coefficient is zero and the pass can be skipped.
    pub fn is_inert(&self) -> bool {
        self.prefactor == 0.0
    }
}

/// Capped pair coefficient for a squared separation `r2` inside the cutoff.
#[inline(always)]
pub fn pair_coefficient(r2: f64, params: &ForceParams) -> f64 {
    let r2 = r2.max(MIN_PAIR_DISTANCE_SQ);
    let r4 = r2 * r2;
    let r8 = r4 * r4;
    let r14 = r8 * r4 * r2;
    let a = match params.potential {
        PairPotential::LennardJones => params.prefactor * (2.0 / r14 - 1.0 / r8),
        PairPotential::Repulsive => params.prefactor / r14,
    };
    a.min(params.force_cap)
}

/// A strategy for the O(N²) force pass.
///
/// Implementations read positions only and write every entry of `out`; they must not
/// observe positions written during the same pass.
pub trait ForceEngine: Send {
    fn compute_forces(&mut self, state: &ParticleState, params: &ForceParams, out: &mut ForceField) -> Result<()>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Picks the force strategy for a run of `num_particles`.
///
/// `Auto` uses the accelerator above `gpu_particle_threshold` when one is compiled in and
/// an adapter is found; every other case runs the Rayon strategy.
pub fn select_force_engine(backend: Backend, num_particles: usize, gpu_particle_threshold: u32) -> Box<dyn ForceEngine> {
    let wants_gpu = match backend {
        Backend::Cpu => false,
        Backend::Gpu => true,
        Backend::Auto => {
            if num_particles <= gpu_particle_threshold as usize {
                info!(
                    "Using CPU force pass: particle count ({}) at or below accelerator threshold ({}).",
                    num_particles, gpu_particle_threshold
                );
                false
            } else {
                true
            }
        }
    };

    if wants_gpu {
        match try_gpu_engine() {
            Ok(engine) => {
                info!("Accelerator force pass enabled for {} particles.", num_particles);
                return engine;
            }
            Err(e) => warn!("Accelerator unavailable ({}). Falling back to CPU force pass.", e),
        }
    }
    Box::new(ParallelCpuForces::new())
}

#[cfg(feature = "gpu")]
fn try_gpu_engine() -> Result<Box<dyn ForceEngine>> {
    Ok(Box::new(WgpuForces::new()?))
}

#[cfg(not(feature = "gpu"))]
fn try_gpu_engine() -> Result<Box<dyn ForceEngine>> {
    Err(SimError::Backend("built without the `gpu` feature".to_string()))
}
