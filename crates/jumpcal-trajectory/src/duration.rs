//! Distance-to-duration models.
//!
//! The shipped model is affine in game units:
//! `duration_ms = slope_ms_per_unit * (distance_px / unit_scale) + offset_ms`.
//!
//! A closed-form alternative treats the jump as a ballistic arc whose
//! vertical and horizontal launch speeds both grow linearly with press
//! time and solves `a·t² + b·t = distance` for `t`. It is not implemented:
//! its constants were never fitted, and the affine fit tracked observed
//! jumps more reliably.

use serde::{Deserialize, Serialize};

use crate::calibration::{CalibrationNotPerformed, CalibrationState};

/// Maps a landing distance to a press duration.
pub trait DurationModel {
    /// Press duration in milliseconds for a frame-pixel distance.
    fn duration_ms(
        &self,
        distance_px: f64,
        calibration: &CalibrationState,
    ) -> Result<f64, CalibrationNotPerformed>;
}

/// `duration = a · distance + b`, fitted per game and device.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AffineDurationModel {
    /// Milliseconds per game unit (`a`).
    pub slope_ms_per_unit: f64,
    /// Constant term in milliseconds (`b`).
    pub offset_ms: f64,
}

impl Default for AffineDurationModel {
    fn default() -> Self {
        Self {
            slope_ms_per_unit: 28.82,
            offset_ms: 107.0,
        }
    }
}

impl DurationModel for AffineDurationModel {
    /// Negative results clamp to zero.
    fn duration_ms(
        &self,
        distance_px: f64,
        calibration: &CalibrationState,
    ) -> Result<f64, CalibrationNotPerformed> {
        let calibrated = calibration.require()?;
        let units = distance_px / calibrated.unit_scale;
        Ok((self.slope_ms_per_unit * units + self.offset_ms).max(0.0))
    }
}
