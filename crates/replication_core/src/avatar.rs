//! # Avatar Motion
//!
//! Per-tick integration of an avatar's heading and speed into its
//! authoritative transform. The motion state lives on the authoritative
//! object and is only mutated through [`AvatarMotion::set_intent`] and
//! [`AvatarMotion::tick`].

use crate::error::{ReplicationError, ReplicationResult};
use crate::types::Vec3;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Motion tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Degrees per second at full heading input.
    pub rotation_rate: f64,
    /// World units per second at full speed input.
    pub linear_rate: f64,
    /// x and y are clamped to `[-bound, bound]`.
    pub bound: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            rotation_rate: 20.0 * 360.0,
            linear_rate: 100.0,
            bound: 10.0,
        }
    }
}

impl MotionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.rotation_rate.is_finite() || !self.linear_rate.is_finite() {
            return Err("Motion rates must be finite".to_string());
        }
        if !self.bound.is_finite() || self.bound <= 0.0 {
            return Err("Motion bound must be a positive number".to_string());
        }
        Ok(())
    }
}

/// Validated steering input, both components in [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Intent {
    heading: f64,
    speed: f64,
}

impl Intent {
    pub fn new(heading: f64, speed: f64) -> ReplicationResult<Self> {
        let in_range = |v: f64| v.is_finite() && (-1.0..=1.0).contains(&v);
        if in_range(heading) && in_range(speed) {
            Ok(Self { heading, speed })
        } else {
            Err(ReplicationError::InvalidIntent { heading, speed })
        }
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn is_idle(&self) -> bool {
        self.heading == 0.0 && self.speed == 0.0
    }
}

/// Position plus rotation around the vertical axis, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub position: Vec3,
    pub h: f64,
}

impl Transform {
    /// Arguments of a `setXYZH` update.
    pub fn xyzh_args(&self) -> Vec<Value> {
        vec![
            Value::from(self.position.x),
            Value::from(self.position.y),
            Value::from(self.position.z),
            Value::from(self.h),
        ]
    }

    /// Reads a transform back from `setXYZH` arguments.
    pub fn from_xyzh_args(args: &[Value]) -> Option<Self> {
        match args {
            [x, y, z, h] => Some(Self {
                position: Vec3::new(x.as_f64()?, y.as_f64()?, z.as_f64()?),
                h: h.as_f64()?,
            }),
            _ => None,
        }
    }
}

/// Motion state of an authoritative avatar.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AvatarMotion {
    intent: Intent,
    transform: Transform,
}

impl AvatarMotion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Replaces the intent. Out-of-range input leaves the state untouched.
    pub fn set_intent(&mut self, heading: f64, speed: f64) -> ReplicationResult<()> {
        self.intent = Intent::new(heading, speed)?;
        Ok(())
    }

    /// Teleports the avatar, e.g. after an authoritative `setXYZH`.
    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    /// Advances the simulation by `dt` seconds.
    ///
    /// # Returns
    ///
    /// The new transform to broadcast, or `None` when the avatar is idle.
    pub fn tick(&mut self, dt: f64, config: &MotionConfig) -> Option<Transform> {
        if self.intent.is_idle() {
            return None;
        }

        let t = &mut self.transform;
        t.h = (t.h + self.intent.heading * config.rotation_rate * dt).rem_euclid(360.0);

        // Forward is +y rotated by h counterclockwise around z.
        let distance = self.intent.speed * config.linear_rate * dt;
        let radians = t.h.to_radians();
        t.position.x -= distance * radians.sin();
        t.position.y += distance * radians.cos();

        t.position.x = t.position.x.clamp(-config.bound, config.bound);
        t.position.y = t.position.y.clamp(-config.bound, config.bound);

        Some(*t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_out_of_range_intent_is_rejected() {
        let mut motion = AvatarMotion::new();
        motion.set_intent(0.5, -0.5).unwrap();

        let err = motion.set_intent(1.5, 0.0).unwrap_err();
        assert!(matches!(err, ReplicationError::InvalidIntent { .. }));
        assert!(motion.set_intent(0.0, f64::NAN).is_err());
        assert!(motion.set_intent(f64::INFINITY, 0.0).is_err());

        assert_eq!(motion.intent().heading(), 0.5);
        assert_eq!(motion.intent().speed(), -0.5);
    }

    #[test]
    fn test_idle_tick_produces_nothing() {
        let mut motion = AvatarMotion::new();
        assert!(motion.tick(0.1, &MotionConfig::default()).is_none());
        assert_eq!(motion.transform(), Transform::default());
    }

    #[test]
    fn test_rotation_only_keeps_position() {
        let config = MotionConfig::default();
        let mut motion = AvatarMotion::new();
        motion.set_intent(1.0, 0.0).unwrap();

        let mut last_h = 0.0;
        for _ in 0..50 {
            let t = motion.tick(0.001, &config).unwrap();
            assert_eq!(t.position, Vec3::zero());
            assert!(t.h >= 0.0 && t.h < 360.0);
            // 7.2 degrees per tick, wrapping at 360
            let expected = (last_h + 7.2f64).rem_euclid(360.0);
            assert!((t.h - expected).abs() < 1e-6);
            last_h = t.h;
        }
    }

    #[test]
    fn test_forward_motion_clamps() {
        let config = MotionConfig::default();
        let mut motion = AvatarMotion::new();
        motion.set_intent(0.0, 1.0).unwrap();

        let t = motion.tick(0.01, &config).unwrap();
        assert!((t.position.y - 1.0).abs() < EPS);
        assert!(t.position.x.abs() < EPS);

        for _ in 0..100 {
            motion.tick(0.05, &config);
        }
        let t = motion.transform();
        assert_eq!(t.position.y, 10.0);
        assert!(t.position.x.abs() < EPS);

        let again = motion.tick(0.05, &config).unwrap();
        assert_eq!(again.position.y, 10.0);
    }

    #[test]
    fn test_heading_changes_direction() {
        let config = MotionConfig::default();
        let mut motion = AvatarMotion::new();
        motion.set_transform(Transform {
            position: Vec3::new(0.0, 0.0, 2.0),
            h: 90.0,
        });
        motion.set_intent(0.0, 1.0).unwrap();

        let t = motion.tick(0.01, &config).unwrap();
        // Facing +90 degrees moves towards -x.
        assert!((t.position.x + 1.0).abs() < EPS);
        assert!(t.position.y.abs() < EPS);
        assert_eq!(t.position.z, 2.0);
    }

    #[test]
    fn test_negative_heading_wraps_positive() {
        let config = MotionConfig::default();
        let mut motion = AvatarMotion::new();
        motion.set_intent(-1.0, 0.0).unwrap();
        let t = motion.tick(0.001, &config).unwrap();
        assert!((t.h - 352.8).abs() < 1e-6);
    }

    #[test]
    fn test_xyzh_args_roundtrip() {
        let t = Transform {
            position: Vec3::new(1.0, -2.0, 3.0),
            h: 45.0,
        };
        assert_eq!(Transform::from_xyzh_args(&t.xyzh_args()), Some(t));
        assert_eq!(Transform::from_xyzh_args(&[Value::from(1.0)]), None);
    }
}
