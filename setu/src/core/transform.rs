//! Rigid 3D transforms.

use serde::{Deserialize, Serialize};

/// Unit quaternion (w, x, y, z).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    /// Identity rotation.
    #[inline]
    pub fn identity() -> Self {
        Self {
            w: 1.0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    /// Rotation of `angle` radians about the Z axis (yaw).
    pub fn from_yaw(angle: f64) -> Self {
        let (s, c) = (angle * 0.5).sin_cos();
        Self {
            w: c,
            x: 0.0,
            y: 0.0,
            z: s,
        }
    }

    /// Hamilton product `self * other`.
    pub fn multiply(&self, other: &Quaternion) -> Quaternion {
        Quaternion {
            w: self.w * other.w - self.x * other.x - self.y * other.y - self.z * other.z,
            x: self.w * other.x + self.x * other.w + self.y * other.z - self.z * other.y,
            y: self.w * other.y - self.x * other.z + self.y * other.w + self.z * other.x,
            z: self.w * other.z + self.x * other.y - self.y * other.x + self.z * other.w,
        }
    }

    /// Conjugate (inverse for unit quaternions).
    #[inline]
    pub fn conjugate(&self) -> Quaternion {
        Quaternion {
            w: self.w,
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }

    /// Rotate a vector.
    pub fn rotate(&self, v: [f64; 3]) -> [f64; 3] {
        // v' = v + 2w(q × v) + 2q × (q × v)
        let q = [self.x, self.y, self.z];
        let t = scale(cross(q, v), 2.0);
        let r = cross(q, t);
        [
            v[0] + self.w * t[0] + r[0],
            v[1] + self.w * t[1] + r[1],
            v[2] + self.w * t[2] + r[2],
        ]
    }

    /// Yaw angle in radians.
    pub fn yaw(&self) -> f64 {
        (2.0 * (self.w * self.z + self.x * self.y))
            .atan2(1.0 - 2.0 * (self.y * self.y + self.z * self.z))
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

/// Rigid transform: rotation followed by translation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rigid3d {
    /// Translation in meters
    pub translation: [f64; 3],
    /// Rotation as unit quaternion
    pub rotation: Quaternion,
}

impl Rigid3d {
    #[inline]
    pub fn new(translation: [f64; 3], rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// Identity transform.
    #[inline]
    pub fn identity() -> Self {
        Self::new([0.0; 3], Quaternion::identity())
    }

    /// Pure translation.
    #[inline]
    pub fn from_translation(translation: [f64; 3]) -> Self {
        Self::new(translation, Quaternion::identity())
    }

    /// Planar pose (x, y, yaw), as used by the 2D robot stack.
    pub fn from_planar(x: f64, y: f64, yaw: f64) -> Self {
        Self::new([x, y, 0.0], Quaternion::from_yaw(yaw))
    }

    /// Compose: `self * other`.
    pub fn compose(&self, other: &Rigid3d) -> Rigid3d {
        let t = self.rotation.rotate(other.translation);
        Rigid3d::new(
            [
                self.translation[0] + t[0],
                self.translation[1] + t[1],
                self.translation[2] + t[2],
            ],
            self.rotation.multiply(&other.rotation),
        )
    }

    /// Inverse transform.
    pub fn inverse(&self) -> Rigid3d {
        let rotation = self.rotation.conjugate();
        let t = rotation.rotate(self.translation);
        Rigid3d::new([-t[0], -t[1], -t[2]], rotation)
    }

    /// Apply to a point.
    pub fn transform_point(&self, p: [f64; 3]) -> [f64; 3] {
        let r = self.rotation.rotate(p);
        [
            r[0] + self.translation[0],
            r[1] + self.translation[1],
            r[2] + self.translation[2],
        ]
    }
}

#[inline]
fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
fn scale(v: [f64; 3], s: f64) -> [f64; 3] {
    [v[0] * s, v[1] * s, v[2] * s]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn assert_close(a: [f64; 3], b: [f64; 3]) {
        for i in 0..3 {
            assert!((a[i] - b[i]).abs() < 1e-9, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_yaw_rotation() {
        let pose = Rigid3d::from_planar(1.0, 2.0, FRAC_PI_2);
        assert_close(pose.transform_point([1.0, 0.0, 0.0]), [1.0, 3.0, 0.0]);
        assert!((pose.rotation.yaw() - FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn test_compose_with_inverse_is_identity() {
        let pose = Rigid3d::from_planar(0.5, -1.5, 0.7);
        let id = pose.compose(&pose.inverse());
        assert_close(id.translation, [0.0; 3]);
        assert!((id.rotation.w.abs() - 1.0).abs() < 1e-9);
    }
}
