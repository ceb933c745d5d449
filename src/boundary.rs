use abp_common::SimParams;
use crate::ensemble::ParticleState;
use rayon::prelude::*;

/// Relative slack on the radial test. A particle projected onto the wall can land a
/// rounding error outside it; the slack keeps a second pass from moving it again.
const RADIAL_TOLERANCE: f64 = 1e-12;

/// Cylinder of radius `wall_radius` spanning `[-half_height, half_height]` along z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cylinder {
    pub wall_radius: f64,
    pub half_height: f64,
    pub particle_diameter: f64,
}

impl Cylinder {
    pub fn new(wall_radius: f64, half_height: f64, particle_diameter: f64) -> Self {
        Self { wall_radius, half_height, particle_diameter }
    }

    pub fn from_params(params: &SimParams) -> Self {
        Self::new(params.wall_radius, params.half_height, params.particle_diameter)
    }

    /// Highest z a particle centre may take: `half_height − L/2`.
    pub fn height_l(&self) -> f64 {
        self.half_height - self.particle_diameter / 2.0
    }

    /// Whether `(x, y, z)` is inside, up to rounding at the wall.
    pub fn contains(&self, x: f64, y: f64, z: f64) -> bool {
        let wall_sq = self.wall_radius * self.wall_radius;
        let h = self.height_l();
        x * x + y * y <= wall_sq * (1.0 + RADIAL_TOLERANCE) && (-h..=h).contains(&z)
    }
}

/// Pulls every particle back inside the cylinder.
///
/// Radially the particle is projected onto the wall. Axially the penetration `D` past
/// `height_L` is reflected back, unless `D > 4·L`, in which case the particle is reset to
/// `±(half_height − 2·L)`. Each particle is handled independently.
pub fn enforce_boundary(state: &mut ParticleState, cylinder: &Cylinder) {
    let wall_sq = cylinder.wall_radius * cylinder.wall_radius;

    (state.x.par_iter_mut(), state.y.par_iter_mut())
        .into_par_iter()
        .for_each(|(x, y)| {
            let r2 = *x * *x + *y * *y;
            if r2 > wall_sq * (1.0 + RADIAL_TOLERANCE) {
                let scale = (wall_sq / r2).sqrt();
                *x *= scale;
                *y *= scale;
            }
        });

    let height_l = cylinder.height_l();
    let reset = cylinder.half_height - 2.0 * cylinder.particle_diameter;
    let max_reflect = 4.0 * cylinder.particle_diameter;

    state.z.par_iter_mut().for_each(|z| {
        *z = fold_axial(*z, height_l, reset, max_reflect);
    });
}

#[inline]
fn fold_axial(z: f64, height_l: f64, reset: f64, max_reflect: f64) -> f64 {
    if z > height_l {
        let d = z - height_l;
        if d > max_reflect { reset } else { height_l - d }
    } else if z < -height_l {
        let d = -height_l - z;
        if d > max_reflect { -reset } else { -height_l + d }
    } else {
        z
    }
}
