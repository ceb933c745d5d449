//! Euler–Maruyama update of orientations and positions.
//!
//! Stage A rotates every orientation by `sqrt(2·δ·De)·(e × ξ)` and renormalizes it
//! (Itô form). Stage B then moves every particle with self-propulsion along the new
//! orientation, the precomputed pair force and translational noise. Stage A finishes for
//! all particles before Stage B starts.

use abp_common::{OrientationNoise, SimParams, Vec3};
use crate::ensemble::ParticleState;
use crate::error::{Result, SimError};
use crate::forces::ForceField;
use crate::noise::{gaussian3, orientation3, ParticleStreams};
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegrationConstants {
    pub delta: f64,
    pub self_propulsion: f64,
    /// `sqrt(2·δ·De)`
    pub prefactor_orientation: f64,
    /// `sqrt(2·δ·Dt)`
    pub prefactor_translation: f64,
    pub orientation_noise: OrientationNoise,
}

impl IntegrationConstants {
    pub fn from_params(params: &SimParams) -> Self {
        Self {
            delta: params.delta,
            self_propulsion: params.self_propulsion,
            prefactor_orientation: params.prefactor_orientation,
            prefactor_translation: params.prefactor_translation,
            orientation_noise: params.orientation_noise,
        }
    }
}

/// Advances every particle by one timestep using forces computed from the positions
/// before this call.
pub fn integrate_step(
    state: &mut ParticleState,
    forces: &ForceField,
    constants: &IntegrationConstants,
    streams: &mut ParticleStreams,
) -> Result<()> {
    let n = state.len();
    state.check_consistent()?;
    forces.check_len(n)?;
    if streams.len() != n {
        return Err(SimError::LengthMismatch { expected: n, found: streams.len() });
    }

    update_orientations(state, constants, streams);
    update_positions(state, forces, constants, streams);
    Ok(())
}

/// Stage A.
fn update_orientations(state: &mut ParticleState, constants: &IntegrationConstants, streams: &mut ParticleStreams) {
    let prefactor = constants.prefactor_orientation;
    let kind = constants.orientation_noise;

    (
        state.ex.par_iter_mut(),
        state.ey.par_iter_mut(),
        state.ez.par_iter_mut(),
        streams.as_mut_slice().par_iter_mut(),
    )
        .into_par_iter()
        .for_each(|(ex, ey, ez, rng)| {
            let xi = Vec3::from(orientation3(rng, kind));
            let e = Vec3::new(*ex, *ey, *ez);
            let rotated = e.add(e.cross(xi).scale(prefactor));
            // e × ξ is perpendicular to e, so the norm only vanishes for a degenerate input.
            if let Some(unit) = rotated.try_normalize() {
                *ex = unit.x;
                *ey = unit.y;
                *ez = unit.z;
            }
        });
}

/// Stage B.
fn update_positions(
    state: &mut ParticleState,
    forces: &ForceField,
    constants: &IntegrationConstants,
    streams: &mut ParticleStreams,
) {
    let delta = constants.delta;
    let drive = constants.self_propulsion * delta;
    let prefactor = constants.prefactor_translation;
    let (ex, ey, ez) = (&state.ex[..], &state.ey[..], &state.ez[..]);
    let (fx, fy, fz) = (&forces.fx[..], &forces.fy[..], &forces.fz[..]);

    (
        state.x.par_iter_mut(),
        state.y.par_iter_mut(),
        state.z.par_iter_mut(),
        streams.as_mut_slice().par_iter_mut(),
    )
        .into_par_iter()
        .enumerate()
        .for_each(|(k, (x, y, z, rng))| {
            let [nx, ny, nz] = gaussian3(rng);
            *x += drive * ex[k] + fx[k] * delta + nx * prefactor;
            *y += drive * ey[k] + fy[k] * delta + ny * prefactor;
            *z += drive * ez[k] + fz[k] * delta + nz * prefactor;
        });
}
