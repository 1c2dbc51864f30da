use jumpcal_core::Direction;
use serde::{Deserialize, Serialize};

use crate::ParamsError;

/// Takeoff tangents measured for the target game.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TakeoffParams {
    pub tan_right: f64,
    pub tan_left: f64,
}

impl Default for TakeoffParams {
    fn default() -> Self {
        Self {
            tan_right: 0.579,
            tan_left: 0.555,
        }
    }
}

/// One takeoff angle with its precomputed trigonometry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TakeoffAngle {
    pub tan: f64,
    pub sin: f64,
    pub cos: f64,
    /// Angle above the horizontal, in radians.
    pub radians: f64,
}

impl TakeoffAngle {
    /// `sin = tan / sqrt(1 + tan²)`, `cos = sin / tan`; a zero tangent is the
    /// horizontal (`cos = 1`).
    pub fn from_tan(tan: f64) -> Self {
        let sin = tan / (1.0 + tan * tan).sqrt();
        let cos = if tan == 0.0 { 1.0 } else { sin / tan };
        Self {
            tan,
            sin,
            cos,
            radians: sin.asin(),
        }
    }
}

/// The right and left takeoff angles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TakeoffAngles {
    pub right: TakeoffAngle,
    pub left: TakeoffAngle,
}

impl TakeoffAngles {
    pub fn new(params: &TakeoffParams) -> Result<Self, ParamsError> {
        for (direction, value) in [
            (Direction::Right, params.tan_right),
            (Direction::Left, params.tan_left),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ParamsError::InvalidTangent { direction, value });
            }
        }
        Ok(Self {
            right: TakeoffAngle::from_tan(params.tan_right),
            left: TakeoffAngle::from_tan(params.tan_left),
        })
    }

    #[inline]
    pub fn get(&self, direction: Direction) -> &TakeoffAngle {
        match direction {
            Direction::Right => &self.right,
            Direction::Left => &self.left,
        }
    }

    /// Sum of both takeoff angles.
    #[inline]
    pub fn total(&self) -> f64 {
        self.right.radians + self.left.radians
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn derived_trig_matches_reference_values() {
        let angles = TakeoffAngles::new(&TakeoffParams::default()).expect("angles");
        assert_abs_diff_eq!(angles.right.sin, 0.501070, epsilon = 1e-6);
        assert_abs_diff_eq!(angles.right.cos, 0.865407, epsilon = 1e-6);
        assert_abs_diff_eq!(angles.left.sin, 0.485272, epsilon = 1e-6);
        assert_abs_diff_eq!(angles.left.cos, 0.874363, epsilon = 1e-6);
        assert_abs_diff_eq!(angles.right.radians, 0.579f64.atan(), epsilon = 1e-12);
        assert_abs_diff_eq!(angles.left.radians, 0.555f64.atan(), epsilon = 1e-12);
    }

    #[test]
    fn zero_tangent_is_horizontal() {
        let a = TakeoffAngle::from_tan(0.0);
        assert_eq!((a.sin, a.cos, a.radians), (0.0, 1.0, 0.0));
    }

    #[test]
    fn rejects_negative_or_nan_tangent() {
        let params = TakeoffParams {
            tan_right: f64::NAN,
            tan_left: 0.5,
        };
        assert!(matches!(
            TakeoffAngles::new(&params),
            Err(ParamsError::InvalidTangent {
                direction: Direction::Right,
                ..
            })
        ));
        let params = TakeoffParams {
            tan_right: 0.5,
            tan_left: -0.1,
        };
        assert!(TakeoffAngles::new(&params).is_err());
    }
}
