//! Session calibration: pivot, unit scale and template scale.
//!
//! Bootstrap protocol, run once per session on a calibration frame:
//! 1. The template scale comes from the locator's scale sweep.
//! 2. An initial pivot is the frame center shifted by two parallax deltas.
//! 3. One estimator pass from that pivot gives a first landing point.
//! 4. The pivot is recomputed as the midpoint of anchor and landing point.
//! 5. The unit scale is the anchor-to-landing pixel distance divided by the
//!    known in-game length of the calibration jump.

use std::fs;
use std::path::Path;

use jumpcal_core::{Direction, Point, RgbImageView};
use jumpcal_locator::Anchor;
use log::info;
use serde::{Deserialize, Serialize};

use crate::estimator::TrajectoryEstimator;

/// Raised when estimation is attempted on an incomplete calibration.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum CalibrationNotPerformed {
    #[error("calibration not performed: pivot is unset")]
    MissingPivot,
    #[error("calibration not performed: pivot ({0}, {1}) is not finite")]
    NonFinitePivot(f64, f64),
    #[error("calibration not performed: unit scale {0} is not a positive number")]
    InvalidUnitScale(f64),
    #[error("calibration not performed: template scale {0} is not a positive number")]
    InvalidTemplateScale(f64),
}

#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error("calibration jump length must be a positive number of game units, got {0}")]
    InvalidJumpLength(f64),
    #[error("calibration frame is degenerate: anchor and landing point coincide")]
    DegenerateCalibration,
}

#[derive(thiserror::Error, Debug)]
pub enum CalibrationIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Constants of the calibration bootstrap.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationParams {
    /// Horizontal shift of the initial pivot from the frame center, in pixels.
    pub pivot_dx: f64,
    /// Vertical shift of the initial pivot from the frame center, in pixels.
    pub pivot_dy: f64,
    /// In-game length of the calibration jump.
    pub calibration_jump_units: f64,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            pivot_dx: 6.75,
            pivot_dy: 5.25,
            calibration_jump_units: 10.5,
        }
    }
}

/// Calibrated session parameters; persisted as JSON between runs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationState {
    /// Player resting position in frame pixels.
    #[serde(default)]
    pub pivot: Option<Point>,
    /// Frame pixels per game unit.
    #[serde(default)]
    pub unit_scale: f64,
    /// Frame-to-template scale found by the locator sweep.
    #[serde(default = "unit_template_scale")]
    pub template_scale: f64,
}

fn unit_template_scale() -> f64 {
    1.0
}

impl Default for CalibrationState {
    fn default() -> Self {
        Self {
            pivot: None,
            unit_scale: 0.0,
            template_scale: unit_template_scale(),
        }
    }
}

/// Validated view of a [`CalibrationState`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Calibrated {
    pub pivot: Point,
    pub unit_scale: f64,
}

impl CalibrationState {
    /// Check that the pivot, unit scale and template scale are usable.
    pub fn require(&self) -> Result<Calibrated, CalibrationNotPerformed> {
        let pivot = self.pivot.ok_or(CalibrationNotPerformed::MissingPivot)?;
        if !(pivot.x.is_finite() && pivot.y.is_finite()) {
            return Err(CalibrationNotPerformed::NonFinitePivot(pivot.x, pivot.y));
        }
        if !(self.unit_scale.is_finite() && self.unit_scale > 0.0) {
            return Err(CalibrationNotPerformed::InvalidUnitScale(self.unit_scale));
        }
        if !(self.template_scale.is_finite() && self.template_scale > 0.0) {
            return Err(CalibrationNotPerformed::InvalidTemplateScale(self.template_scale));
        }
        Ok(Calibrated {
            pivot,
            unit_scale: self.unit_scale,
        })
    }

    pub fn is_calibrated(&self) -> bool {
        self.require().is_ok()
    }

    /// Load a calibration from JSON on disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CalibrationIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this calibration to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CalibrationIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Initial pivot guess: frame center shifted by the parallax deltas.
pub fn initial_pivot(width: usize, height: usize, params: &CalibrationParams) -> Point {
    Point::new(
        width as f64 / 2.0 + params.pivot_dx,
        height as f64 / 2.0 + params.pivot_dy,
    )
}

/// Run steps 2-5 of the bootstrap for an anchor found in `frame`.
///
/// The pass uses `Right` as its prior direction and leaves any session
/// direction state alone.
pub fn bootstrap_calibration(
    frame: &RgbImageView<'_>,
    anchor: &Anchor,
    template_scale: f64,
    params: &CalibrationParams,
    estimator: &TrajectoryEstimator,
) -> Result<CalibrationState, CalibrationError> {
    let units = params.calibration_jump_units;
    if !(units.is_finite() && units > 0.0) {
        return Err(CalibrationError::InvalidJumpLength(units));
    }

    let guess = initial_pivot(frame.width, frame.height, params);
    let first = estimator.estimate_from_pivot(frame, anchor, guess, Direction::Right);

    let measured = nalgebra::distance(&anchor.position, &first.landing);
    if !(measured.is_finite() && measured > f64::EPSILON) {
        return Err(CalibrationError::DegenerateCalibration);
    }
    let pivot = nalgebra::center(&anchor.position, &first.landing);
    let unit_scale = measured / units;

    info!(
        "calibrated pivot ({:.2}, {:.2}) from guess ({:.2}, {:.2}); unit scale {:.4} px/unit",
        pivot.x, pivot.y, guess.x, guess.y, unit_scale
    );

    Ok(CalibrationState {
        pivot: Some(pivot),
        unit_scale,
        template_scale,
    })
}
