use jumpcal_core::{Direction, GrayImage, RgbImageView};
use jumpcal_locator::{Anchor, LocateError, TargetLocator};
use jumpcal_trajectory::{
    bootstrap_calibration, CalibrationError, CalibrationNotPerformed, CalibrationParams,
    CalibrationState, DurationModel, ParamsError, TrajectoryEstimator, TrajectoryResult,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::config::JumpConfig;

/// What to do with an anchor whose match confidence is low.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidencePolicy {
    pub min_confidence: f64,
    /// Fail the estimate instead of proceeding with a warning.
    pub reject: bool,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            reject: false,
        }
    }
}

/// Errors raised while building a session or calibrating it.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error(transparent)]
    Params(#[from] ParamsError),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),
}

#[derive(thiserror::Error, Debug)]
pub enum EstimateError {
    #[error(transparent)]
    NotCalibrated(#[from] CalibrationNotPerformed),

    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error("anchor confidence {confidence:.3} is below {min_confidence}")]
    LowConfidenceMatch { confidence: f64, min_confidence: f64 },
}

/// One game session: locator, estimator, calibration and the direction of
/// the previous jump.
///
/// `estimate` takes `&mut self` because it advances the stored direction.
pub struct JumpSession {
    locator: TargetLocator,
    estimator: TrajectoryEstimator,
    calibration: CalibrationState,
    calibration_params: CalibrationParams,
    duration: Box<dyn DurationModel + Send>,
    confidence: ConfidencePolicy,
    direction: Direction,
}

impl JumpSession {
    /// Uncalibrated session; call [`JumpSession::calibrate`] before estimating.
    pub fn new(template: GrayImage, config: &JumpConfig) -> Result<Self, SessionError> {
        Ok(Self {
            locator: TargetLocator::new(template, config.locator.clone())?,
            estimator: TrajectoryEstimator::new(&config.takeoff, config.region)?,
            calibration: CalibrationState::default(),
            calibration_params: config.calibration,
            duration: Box::new(config.duration),
            confidence: config.confidence,
            direction: Direction::default(),
        })
    }

    /// Session restored from a persisted calibration.
    ///
    /// The working template is resized with the stored template scale.
    pub fn with_calibration(
        template: GrayImage,
        config: &JumpConfig,
        calibration: CalibrationState,
    ) -> Result<Self, SessionError> {
        let mut session = Self::new(template, config)?;
        session
            .locator
            .set_template_scale(calibration.template_scale)?;
        session.calibration = calibration;
        Ok(session)
    }

    /// Swap the distance-to-duration model.
    pub fn set_duration_model(&mut self, model: impl DurationModel + Send + 'static) {
        self.duration = Box::new(model);
    }

    pub fn calibration(&self) -> &CalibrationState {
        &self.calibration
    }

    pub fn locator(&self) -> &TargetLocator {
        &self.locator
    }

    pub fn estimator(&self) -> &TrajectoryEstimator {
        &self.estimator
    }

    /// Direction of the previous jump (`Right` before the first cycle).
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    /// Calibrate template scale, pivot and unit scale on one frame.
    ///
    /// The stored direction is left as is.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, frame), fields(width = frame.width, height = frame.height))
    )]
    pub fn calibrate(&mut self, frame: &RgbImageView<'_>) -> Result<CalibrationState, SessionError> {
        let scale = self.locator.calibrate_scale(frame)?;
        let anchor = self.locator.locate(frame)?;
        let state = bootstrap_calibration(
            frame,
            &anchor,
            scale.scale,
            &self.calibration_params,
            &self.estimator,
        )?;
        self.calibration = state;
        Ok(state)
    }

    fn check_confidence(&self, anchor: &Anchor) -> Result<(), EstimateError> {
        let min_confidence = self.confidence.min_confidence;
        if anchor.confidence >= min_confidence {
            return Ok(());
        }
        if self.confidence.reject {
            return Err(EstimateError::LowConfidenceMatch {
                confidence: anchor.confidence,
                min_confidence,
            });
        }
        warn!(
            "low anchor confidence {:.3} (< {}), proceeding",
            anchor.confidence, min_confidence
        );
        Ok(())
    }

    /// Locate the anchor and estimate the landing point.
    ///
    /// Fails before looking at the frame when the session is uncalibrated.
    /// On success the stored direction becomes the estimated one.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame), fields(prior = %self.direction))
    )]
    pub fn estimate(&mut self, frame: &RgbImageView<'_>) -> Result<TrajectoryResult, EstimateError> {
        self.calibration.require()?;
        let anchor = self.locator.locate(frame)?;
        self.check_confidence(&anchor)?;
        let result = self
            .estimator
            .estimate(frame, &anchor, &self.calibration, self.direction)?;
        self.direction = result.direction;
        Ok(result)
    }

    /// Press duration for an estimate, in milliseconds.
    pub fn duration_ms(&self, result: &TrajectoryResult) -> Result<f64, CalibrationNotPerformed> {
        let ms = self.duration.duration_ms(result.distance, &self.calibration)?;
        info!(
            "{} jump: {:.1}px -> {:.0} ms",
            result.direction, result.distance, ms
        );
        Ok(ms)
    }
}
