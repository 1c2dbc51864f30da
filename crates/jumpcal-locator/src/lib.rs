//! Anchor locator for the jump automation pipeline.
//!
//! The anchor marker is found by zero-mean normalized cross-correlation of a
//! grayscale template against the frame:
//! 1. Convert the RGB frame to grayscale (BT.601 weights).
//! 2. Slide the working template over every placement, scoring with
//!    `TM_CCOEFF_NORMED` semantics.
//! 3. Report the contact point `top_left + (w / 2, 0.9 * h)` together with
//!    the raw score as confidence.
//!
//! The template size is calibrated once per session by sweeping a range of
//! scales against a calibration frame ([`TargetLocator::calibrate_scale`]).

mod locator;
mod ncc;

pub use locator::{Anchor, LocatorParams, ScaleCalibration, TargetLocator};
pub use ncc::{best_match, TemplateMatch};

/// Errors returned by the locator.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LocateError {
    #[error("template is empty")]
    EmptyTemplate,

    #[error("template {template:?} does not fit in frame {frame:?}")]
    TemplateTooLarge { template: [usize; 2], frame: [usize; 2] },

    #[error("no scale in [{min}, {max}] produced a template that fits the frame")]
    NoUsableScale { min: f64, max: f64 },

    #[error("invalid scale range (min={min}, max={max}, samples={samples})")]
    InvalidScaleRange { min: f64, max: f64, samples: usize },

    #[error("invalid template scale {0}")]
    InvalidTemplateScale(f64),
}
