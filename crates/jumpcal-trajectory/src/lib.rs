//! Landing-point geometry and jump timing.
//!
//! Given an anchor, a calibrated pivot and the previous jump direction:
//! 1. Classify the new direction from the anchor's side of the pivot.
//! 2. On a direction reversal, correct the pivot-to-anchor distance for the
//!    unequal left/right takeoff angles.
//! 3. Project the (corrected) distance from the pivot along the takeoff angle.
//! 4. Snap the projected point to the centroid of its uniform-color region.
//!
//! [`CalibrationState`] holds the session calibration and
//! [`DurationModel`] turns the landing distance into a press duration.

mod calibration;
mod duration;
mod estimator;
mod region;
mod takeoff;

use jumpcal_core::Direction;

pub use calibration::{
    bootstrap_calibration, initial_pivot, Calibrated, CalibrationError, CalibrationIoError,
    CalibrationNotPerformed, CalibrationParams, CalibrationState,
};
pub use duration::{AffineDurationModel, DurationModel};
pub use estimator::{
    angle_to_anchor, project_from_pivot, turn_corrected_distance, Projection,
    TrajectoryEstimator, TrajectoryResult,
};
pub use region::{grow_region, refine_landing, RegionBounds, RegionGrowParams};
pub use takeoff::{TakeoffAngle, TakeoffAngles, TakeoffParams};

/// Invalid estimator configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParamsError {
    #[error("takeoff tangent for {direction} must be finite and non-negative, got {value}")]
    InvalidTangent { direction: Direction, value: f64 },
}
