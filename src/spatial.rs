//! Listener and emitter descriptions for 3D cues.
//!
//! Both use the application's right-handed coordinates. They are converted to
//! the engine's left-handed convention (Z negated) when a cue is positioned.

use crate::error::{CueBridgeError, Result};
use crate::math::{Pose, Vec3, flip_handedness};
use crate::native::{EmitterState, ListenerState};

/// The point of view sounds are heard from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioListener {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    pub velocity: Vec3,
}

impl Default for AudioListener {
    fn default() -> Self {
        Self::from_pose(&Pose::identity())
    }
}

impl AudioListener {
    pub fn from_pose(pose: &Pose) -> Self {
        Self {
            position: pose.position,
            forward: pose.forward(),
            up: pose.up(),
            velocity: Vec3::ZERO,
        }
    }

    pub fn set_pose(&mut self, pose: &Pose) {
        self.position = pose.position;
        self.forward = pose.forward();
        self.up = pose.up();
    }

    pub(crate) fn to_native(self) -> ListenerState {
        ListenerState {
            position: flip_handedness(self.position),
            forward: flip_handedness(self.forward),
            up: flip_handedness(self.up),
            velocity: flip_handedness(self.velocity),
        }
    }
}

/// A sound source in 3D space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioEmitter {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    pub velocity: Vec3,
    doppler_scale: f32,
}

impl Default for AudioEmitter {
    fn default() -> Self {
        Self::from_pose(&Pose::identity())
    }
}

impl AudioEmitter {
    pub fn from_pose(pose: &Pose) -> Self {
        Self {
            position: pose.position,
            forward: pose.forward(),
            up: pose.up(),
            velocity: Vec3::ZERO,
            doppler_scale: 1.0,
        }
    }

    pub fn set_pose(&mut self, pose: &Pose) {
        self.position = pose.position;
        self.forward = pose.forward();
        self.up = pose.up();
    }

    pub fn doppler_scale(&self) -> f32 {
        self.doppler_scale
    }

    /// Scales the doppler effect for this emitter.
    ///
    /// # Errors
    ///
    /// [`CueBridgeError::Argument`] if `scale` is negative or not a number.
    pub fn set_doppler_scale(&mut self, scale: f32) -> Result<()> {
        if scale.is_nan() || scale < 0.0 {
            return Err(CueBridgeError::Argument(format!(
                "doppler scale must be non-negative, got {scale}"
            )));
        }
        self.doppler_scale = scale;
        Ok(())
    }

    pub(crate) fn to_native(self) -> EmitterState {
        EmitterState {
            position: flip_handedness(self.position),
            forward: flip_handedness(self.forward),
            up: flip_handedness(self.up),
            velocity: flip_handedness(self.velocity),
            doppler_scale: self.doppler_scale,
            channel_count: 1,
            channel_radius: 1.0,
            curve_distance_scale: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Quat;

    #[test]
    fn negative_doppler_scale_is_rejected() {
        let mut emitter = AudioEmitter::default();
        assert!(matches!(
            emitter.set_doppler_scale(-0.5),
            Err(CueBridgeError::Argument(_))
        ));
        assert!(emitter.set_doppler_scale(f32::NAN).is_err());
        assert_eq!(emitter.doppler_scale(), 1.0);

        emitter.set_doppler_scale(0.0).expect("zero is allowed");
        assert_eq!(emitter.doppler_scale(), 0.0);
    }

    #[test]
    fn native_state_uses_left_handed_coordinates() {
        let mut emitter = AudioEmitter::from_pose(&Pose::from_position(Vec3::new(1.0, 2.0, 3.0)));
        emitter.velocity = Vec3::new(0.0, 0.0, 4.0);
        let native = emitter.to_native();

        assert_eq!(native.position, Vec3::new(1.0, 2.0, -3.0));
        assert_eq!(native.forward, Vec3::Z);
        assert_eq!(native.velocity, Vec3::new(0.0, 0.0, -4.0));
        assert_eq!(native.channel_count, 1);
        assert_eq!(native.channel_radius, 1.0);
        assert_eq!(native.curve_distance_scale, 1.0);
    }

    #[test]
    fn listener_follows_pose() {
        let pose = Pose::new(
            Vec3::new(0.0, 1.5, 0.0),
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
        );
        let mut listener = AudioListener::default();
        listener.set_pose(&pose);

        assert_eq!(listener.position, Vec3::new(0.0, 1.5, 0.0));
        assert!(listener.forward.abs_diff_eq(Vec3::NEG_X, 1e-6));
        assert!(listener.up.abs_diff_eq(Vec3::Y, 1e-6));
    }
}
