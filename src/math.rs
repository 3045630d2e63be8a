//! Math types for CueBridge

pub use glam::{Quat, Vec3};

/// Position and orientation in the application's right-handed coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * (-Vec3::Z)
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    pub fn distance(&self, other: &Self) -> f32 {
        self.position.distance(other.position)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Converts between the right-handed application convention and the
/// left-handed convention of the native engine.
pub(crate) fn flip_handedness(v: Vec3) -> Vec3 {
    Vec3::new(v.x, v.y, -v.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_pose_looks_down_negative_z() {
        let pose = Pose::identity();
        assert_eq!(pose.forward(), Vec3::NEG_Z);
        assert_eq!(pose.up(), Vec3::Y);
    }

    #[test]
    fn flipping_twice_is_identity() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(flip_handedness(v), Vec3::new(1.0, 2.0, -3.0));
        assert_eq!(flip_handedness(flip_handedness(v)), v);
    }
}
