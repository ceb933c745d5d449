//! Separation of the initial draw.
//!
//! Each sweep walks the anchors `k` in order. The offenders of `k` (particles closer than
//! `min_separation`) are found with a parallel read-only scan; each offender `j` then gets
//! its `(x, y)` redrawn from the placement distribution, keeping `z`, until it clears `k`
//! or the per-pair budget runs out. Redraws can open new overlaps against earlier anchors,
//! so sweeps repeat until one completes without a redraw.

use crate::ensemble::{ParticleState, Placement};
use crate::error::{Result, SimError};
use log::debug;
use rand::Rng;
use rayon::prelude::*;

/// What the resolver had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverlapReport {
    /// Sweeps run, including the final clean one.
    pub sweeps: u32,
    /// Total `(x, y)` redraws across all sweeps.
    pub redraws: u64,
}

pub fn resolve_overlaps<R: Rng + ?Sized>(
    state: &mut ParticleState,
    placement: &Placement,
    min_separation: f64,
    max_attempts: u32,
    max_sweeps: u32,
    rng: &mut R,
) -> Result<OverlapReport> {
    state.check_consistent()?;
    let min_sq = min_separation * min_separation;
    let mut report = OverlapReport::default();

    for sweep in 0..max_sweeps {
        report.sweeps = sweep + 1;
        let mut sweep_redraws = 0u64;

        for k in 0..state.len() {
            for j in offenders_of(state, k, min_sq) {
                let mut attempts = 0;
                while pair_distance_sq(state, k, j) < min_sq {
                    if attempts == max_attempts {
                        return Err(SimError::DensityInfeasible {
                            reason: format!(
                                "particles {k} and {j} still closer than {min_separation} after {max_attempts} redraws"
                            ),
                        });
                    }
                    let (x, y) = placement.sample_xy(rng);
                    state.x[j] = x;
                    state.y[j] = y;
                    attempts += 1;
                }
                sweep_redraws += attempts as u64;
            }
        }

        report.redraws += sweep_redraws;
        debug!("Overlap sweep {}: {} redraws", report.sweeps, sweep_redraws);
        if sweep_redraws == 0 {
            return Ok(report);
        }
    }

    Err(SimError::DensityInfeasible {
        reason: format!("overlaps remain after {max_sweeps} sweeps ({} redraws)", report.redraws),
    })
}

/// Indices `j != k` closer to `k` than the minimum separation, in ascending order.
fn offenders_of(state: &ParticleState, k: usize, min_sq: f64) -> Vec<usize> {
    (0..state.len())
        .into_par_iter()
        .filter(|&j| j != k && pair_distance_sq(state, k, j) < min_sq)
        .collect()
}

#[inline]
fn pair_distance_sq(state: &ParticleState, a: usize, b: usize) -> f64 {
    let dx = state.x[a] - state.x[b];
    let dy = state.y[a] - state.y[b];
    let dz = state.z[a] - state.z[b];
    dx * dx + dy * dy + dz * dz
}

/// Smallest pairwise distance in the ensemble, `f64::INFINITY` for fewer than two particles.
pub fn min_pair_distance(state: &ParticleState) -> f64 {
    let n = state.len();
    (0..n)
        .into_par_iter()
        .map(|a| {
            ((a + 1)..n)
                .map(|b| pair_distance_sq(state, a, b))
                .fold(f64::INFINITY, f64::min)
        })
        .reduce(|| f64::INFINITY, f64::min)
        .sqrt()
}
