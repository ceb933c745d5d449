use serde::{Deserialize, Serialize};

// Basic 3D vector type used at the edges of the engine (initial draws, tests,
// snapshots). The hot loops work directly on the SoA buffers.
#[derive(Copy, Clone, Default, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    #[inline(always)]
    pub fn new(x: f64, y: f64, z: f64) -> Self { Self { x, y, z } }
    #[inline(always)]
    pub fn zero() -> Self { Self::new(0.0, 0.0, 0.0) }
    #[inline(always)]
    pub fn length_squared(self) -> f64 { self.x * self.x + self.y * self.y + self.z * self.z }
    #[inline(always)]
    pub fn length(self) -> f64 { self.length_squared().sqrt() }
    #[inline(always)]
    pub fn distance_squared(self, other: Self) -> f64 { self.sub(other).length_squared() }
    #[inline(always)]
    pub fn distance(self, other: Self) -> f64 { self.distance_squared(other).sqrt() }
    #[inline(always)]
    pub fn add(self, other: Self) -> Self { Self::new(self.x + other.x, self.y + other.y, self.z + other.z) }
    #[inline(always)]
    pub fn sub(self, other: Self) -> Self { Self::new(self.x - other.x, self.y - other.y, self.z - other.z) }
    #[inline(always)]
    pub fn scale(self, scalar: f64) -> Self { Self::new(self.x * scalar, self.y * scalar, self.z * scalar) }
    #[inline(always)]
    pub fn dot(self, other: Self) -> f64 { self.x * other.x + self.y * other.y + self.z * other.z }

    /// Right-handed cross product `self × other`.
    #[inline(always)]
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Normalizes the vector, returning `None` if the length is zero or very small.
    pub fn try_normalize(self) -> Option<Vec3> {
        let len_sq = self.length_squared();
        if len_sq > MIN_NORM_SQ {
            Some(self.scale(1.0 / len_sq.sqrt()))
        } else {
            None
        }
    }

    #[inline(always)]
    pub fn to_array(self) -> [f64; 3] { [self.x, self.y, self.z] }
}

impl From<[f64; 3]> for Vec3 {
    fn from(v: [f64; 3]) -> Self { Self::new(v[0], v[1], v[2]) }
}

/// Squared norms below this are treated as degenerate directions.
pub const MIN_NORM_SQ: f64 = 1e-24;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_follows_right_hand_rule() {
        let x = Vec3::new(1.0, 0.0, 0.0);
        let y = Vec3::new(0.0, 1.0, 0.0);
        assert_eq!(x.cross(y), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(y.cross(x), Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn cross_is_orthogonal_to_both_inputs() {
        let a = Vec3::new(0.3, -1.2, 2.0);
        let b = Vec3::new(-0.7, 0.4, 0.9);
        let c = a.cross(b);
        assert!(c.dot(a).abs() < 1e-12);
        assert!(c.dot(b).abs() < 1e-12);
    }

    #[test]
    fn try_normalize_rejects_zero() {
        assert!(Vec3::zero().try_normalize().is_none());
        let n = Vec3::new(3.0, 0.0, 4.0).try_normalize().unwrap();
        assert!((n.length() - 1.0).abs() < 1e-15);
        assert!((n.x - 0.6).abs() < 1e-15);
    }
}
