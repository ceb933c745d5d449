use super::{pair_coefficient, ForceEngine, ForceField, ForceParams};
use crate::ensemble::ParticleState;
use crate::error::Result;
use rayon::prelude::*;

/// Rayon fan-out over particles: every worker reads the shared position buffers and
/// writes the force of the particle it owns.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParallelCpuForces;

impl ParallelCpuForces {
    pub fn new() -> Self {
        Self
    }
}

impl ForceEngine for ParallelCpuForces {
    fn compute_forces(&mut self, state: &ParticleState, params: &ForceParams, out: &mut ForceField) -> Result<()> {
        let num_particles = state.len();
        state.check_consistent()?;
        out.check_len(num_particles)?;

        if params.is_inert() {
            out.clear();
            return Ok(());
        }

        let cutoff_sq = params.cutoff * params.cutoff;
        let (x, y, z) = (&state.x[..], &state.y[..], &state.z[..]);

        (out.fx.par_iter_mut(), out.fy.par_iter_mut(), out.fz.par_iter_mut())
            .into_par_iter()
            .enumerate()
            .for_each(|(k, (fx_out, fy_out, fz_out))| {
                let [fx, fy, fz] = net_force(k, x, y, z, params, cutoff_sq);
                *fx_out = fx;
                *fy_out = fy;
                *fz_out = fz;
            });

        Ok(())
    }

    fn name(&self) -> &'static str {
        "cpu-rayon"
    }
}

/// Net force on particle `k` from every other particle inside the cutoff.
#[inline]
pub fn net_force(k: usize, x: &[f64], y: &[f64], z: &[f64], params: &ForceParams, cutoff_sq: f64) -> [f64; 3] {
    let (xk, yk, zk) = (x[k], y[k], z[k]);
    let mut f = [0.0f64; 3];
    for j in 0..x.len() {
        if j == k {
            continue;
        }
        let dx = xk - x[j];
        let dy = yk - y[j];
        let dz = zk - z[j];
        let r2 = dx * dx + dy * dy + dz * dz;
        if r2 >= cutoff_sq {
            continue;
        }
        let a = pair_coefficient(r2, params);
        f[0] += a * dx;
        f[1] += a * dy;
        f[2] += a * dz;
    }
    f
}
