// Tilt angles from a single accelerometer sample
//
// Each angle is recomputed from the gravity vector on every call; nothing is
// integrated over time. Pitch and yaw are undefined when their two inputs are
// both zero and are reported as 0 in that case.

use serde::{Deserialize, Serialize};

/// Raw acceleration reading in the sensor frame (unitless)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Sample {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean norm of the vector
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Tilt angles in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AngleTriple {
    /// Forward/back tilt (rotation about X)
    pub pitch: f64,
    /// Left/right tilt (rotation about Y)
    pub roll: f64,
    /// Rotation about the vertical axis
    pub yaw: f64,
}

impl AngleTriple {
    pub fn new(pitch: f64, roll: f64, yaw: f64) -> Self {
        Self { pitch, roll, yaw }
    }

    /// Read one axis
    pub fn axis(&self, axis: CaptureAxis) -> f64 {
        match axis {
            CaptureAxis::Pitch => self.pitch,
            CaptureAxis::Roll => self.roll,
            CaptureAxis::Yaw => self.yaw,
        }
    }
}

/// Which angle feeds the calibration slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureAxis {
    Pitch,
    Roll,
    Yaw,
}

impl CaptureAxis {
    pub fn display_name(&self) -> &'static str {
        match self {
            CaptureAxis::Pitch => "PITCH",
            CaptureAxis::Roll => "ROLL",
            CaptureAxis::Yaw => "YAW",
        }
    }
}

/// Convert an acceleration sample into pitch/roll/yaw in degrees
///
/// - `pitch = atan2(y, z)`, 0 when `y = z = 0`
/// - `roll  = atan2(-x, sqrt(y² + z²))`
/// - `yaw   = atan2(x, y)`, 0 when `x = y = 0`
pub fn accel_to_angles(sample: &Sample) -> AngleTriple {
    let pitch = if sample.y == 0.0 && sample.z == 0.0 {
        0.0
    } else {
        sample.y.atan2(sample.z)
    };

    let roll = (-sample.x).atan2((sample.y * sample.y + sample.z * sample.z).sqrt());

    let yaw = if sample.x == 0.0 && sample.y == 0.0 {
        0.0
    } else {
        sample.x.atan2(sample.y)
    };

    // `+ 0.0` folds a negative zero from atan2(-0.0, _) into 0.0
    AngleTriple {
        pitch: pitch.to_degrees() + 0.0,
        roll: roll.to_degrees() + 0.0,
        yaw: yaw.to_degrees() + 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_flat_device() {
        let angles = accel_to_angles(&Sample::new(0.0, 0.0, 1.0));
        assert!(angles.pitch.abs() < EPS);
        assert!(angles.roll.abs() < EPS);
        assert_eq!(angles.yaw, 0.0);
    }

    #[test]
    fn test_gravity_along_x() {
        for x in [1.0, 0.5, -1.0, -9.81] {
            let angles = accel_to_angles(&Sample::new(x, 0.0, 0.0));
            assert_eq!(angles.pitch, 0.0);
            assert!((angles.roll.abs() - 90.0).abs() < EPS);
            assert!((angles.yaw.abs() - 90.0).abs() < EPS);
            // roll opposes the sign of x, yaw follows it
            assert_eq!(angles.roll.signum(), -x.signum());
            assert_eq!(angles.yaw.signum(), x.signum());
        }
    }

    #[test]
    fn test_origin_is_all_zero() {
        let angles = accel_to_angles(&Sample::default());
        assert_eq!(angles, AngleTriple::default());

        let angles = accel_to_angles(&Sample::new(-0.0, 0.0, -0.0));
        assert_eq!(angles.pitch, 0.0);
        assert_eq!(angles.yaw, 0.0);
    }

    #[test]
    fn test_pitch_forward_tilt() {
        let angles = accel_to_angles(&Sample::new(0.0, 1.0, 1.0));
        assert!((angles.pitch - 45.0).abs() < EPS);
        assert!(angles.roll.abs() < EPS);
        assert!(angles.yaw.abs() < EPS);
    }

    #[test]
    fn test_roll_side_tilt() {
        // 30° to the left: x = -sin(30°), z = cos(30°)
        let angles = accel_to_angles(&Sample::new(-0.5, 0.0, 3f64.sqrt() / 2.0));
        assert!((angles.roll - 30.0).abs() < 1e-6);
    }

    #[test]
    fn test_axis_selection() {
        let angles = AngleTriple::new(1.0, 2.0, 3.0);
        assert_eq!(angles.axis(CaptureAxis::Pitch), 1.0);
        assert_eq!(angles.axis(CaptureAxis::Roll), 2.0);
        assert_eq!(angles.axis(CaptureAxis::Yaw), 3.0);
    }

    #[test]
    fn test_magnitude() {
        assert!((Sample::new(3.0, 4.0, 0.0).magnitude() - 5.0).abs() < EPS);
    }
}
