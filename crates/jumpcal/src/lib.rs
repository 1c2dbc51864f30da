//! High-level facade for the `jumpcal-*` workspace.
//!
//! This crate provides:
//! - re-exports of the underlying crates (`core`, `locator`, `trajectory`)
//! - [`JumpSession`]: calibrate once, then estimate the landing point and
//!   press duration per frame
//! - [`ControlLoop`]: the capture/estimate/press loop with its mode state
//!   machine
//! - device adapters (`adb`, image directories, dry run) and JSON config
//!
//! ## Quickstart
//!
//! ```no_run
//! use jumpcal::{load_frame, load_template, JumpConfig, JumpSession};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = JumpConfig::default();
//! let template = load_template("anchor.png")?;
//! let mut session = JumpSession::new(template, &config)?;
//!
//! let first = load_frame("calibration.png", config.frame_scale)?;
//! session.calibrate(&first.view())?.write_json("calibration.json")?;
//!
//! let frame = load_frame("next.png", config.frame_scale)?;
//! let result = session.estimate(&frame.view())?;
//! println!("press for {:.0} ms", session.duration_ms(&result)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `jumpcal::core`: image buffers, `Direction`, logger setup.
//! - `jumpcal::locator`: NCC template matching and the scale sweep.
//! - `jumpcal::trajectory`: turn correction, projection, region growing,
//!   calibration state and duration models.

pub use jumpcal_core as core;
pub use jumpcal_locator as locator;
pub use jumpcal_trajectory as trajectory;

pub use jumpcal_core::{Direction, Point, RgbImage};
pub use jumpcal_locator::{Anchor, LocatorParams, TargetLocator};
pub use jumpcal_trajectory::{
    AffineDurationModel, CalibrationNotPerformed, CalibrationParams, CalibrationState,
    DurationModel, TrajectoryEstimator, TrajectoryResult,
};

mod config;
mod control;
mod device;
mod session;

pub use config::{ConfigIoError, JumpConfig};
pub use control::{
    ActuationFailurePolicy, ChannelEvents, ControlLoop, CycleReport, LoopError, LoopParams,
    ModeEvent, ModeEvents, OperatingMode, Pause, PauseKind, RunSummary, SkipReason, StepOutcome,
    ThreadPause,
};
pub use device::{
    frame_from_image, load_frame, load_template, ActuatorSink, AdbDevice, DeviceError,
    FrameSource, ImageDirSource, LogActuator, Press,
};
pub use session::{ConfidencePolicy, EstimateError, JumpSession, SessionError};
