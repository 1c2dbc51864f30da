//! JSON configuration for a jumpcal session.

use std::fs;
use std::path::Path;

use jumpcal_locator::LocatorParams;
use jumpcal_trajectory::{AffineDurationModel, CalibrationParams, RegionGrowParams, TakeoffParams};
use serde::{Deserialize, Serialize};

use crate::control::LoopParams;
use crate::session::ConfidencePolicy;

#[derive(thiserror::Error, Debug)]
pub enum ConfigIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Every tunable constant of the pipeline. Missing sections take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JumpConfig {
    pub locator: LocatorParams,
    pub takeoff: TakeoffParams,
    pub region: RegionGrowParams,
    pub calibration: CalibrationParams,
    pub duration: AffineDurationModel,
    pub confidence: ConfidencePolicy,
    pub control: LoopParams,
    /// Resize factor applied to captured screens before processing.
    pub frame_scale: f64,
}

impl Default for JumpConfig {
    fn default() -> Self {
        Self {
            locator: LocatorParams::default(),
            takeoff: TakeoffParams::default(),
            region: RegionGrowParams::default(),
            calibration: CalibrationParams::default(),
            duration: AffineDurationModel::default(),
            confidence: ConfidencePolicy::default(),
            control: LoopParams::default(),
            frame_scale: 0.3,
        }
    }
}

impl JumpConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
