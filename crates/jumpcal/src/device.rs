//! Frame sources and actuator sinks.
//!
//! The pipeline only sees the [`FrameSource`] and [`ActuatorSink`] traits.
//! Shipped adapters: a directory replay source, an `adb`-driven Android
//! device, and a logging dry-run actuator.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use image::imageops::FilterType;
use jumpcal_core::{rgb_to_gray, scaled_size, GrayImage, RgbImage};
use log::{debug, info};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum DeviceError {
    #[error("frame source is exhausted")]
    Exhausted,

    #[error("`{command}` failed: {detail}")]
    CommandFailed { command: String, detail: String },

    #[error("invalid frame scale {0}")]
    InvalidFrameScale(f64),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Decode(#[from] image::ImageError),

    #[error(transparent)]
    Frame(#[from] jumpcal_core::ImageError),
}

/// Supplies frames of a fixed size for the whole session.
pub trait FrameSource {
    fn capture(&mut self) -> Result<RgbImage, DeviceError>;
}

/// Executes a touch-and-hold at a screen point.
///
/// Implementations report transport failures; callers never retry them.
pub trait ActuatorSink {
    fn press(&mut self, point: [u32; 2], duration_ms: u64) -> Result<(), DeviceError>;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn capture(&mut self) -> Result<RgbImage, DeviceError> {
        (**self).capture()
    }
}

impl<T: ActuatorSink + ?Sized> ActuatorSink for Box<T> {
    fn press(&mut self, point: [u32; 2], duration_ms: u64) -> Result<(), DeviceError> {
        (**self).press(point, duration_ms)
    }
}

/// Convert a decoded image into a frame, resized by `scale`.
pub fn frame_from_image(img: &image::DynamicImage, scale: f64) -> Result<RgbImage, DeviceError> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(DeviceError::InvalidFrameScale(scale));
    }
    let rgb = img.to_rgb8();
    let (w, h) = (rgb.width() as usize, rgb.height() as usize);
    if scale == 1.0 {
        return Ok(RgbImage::new(w, h, rgb.into_raw())?);
    }
    let (sw, sh) = scaled_size(w, h, scale);
    if sw == 0 || sh == 0 {
        return Err(jumpcal_core::ImageError::InvalidDimensions {
            width: sw,
            height: sh,
        }
        .into());
    }
    let resized = image::imageops::resize(&rgb, sw as u32, sh as u32, FilterType::Triangle);
    Ok(RgbImage::new(sw, sh, resized.into_raw())?)
}

/// Load an image file as a frame, resized by `scale`.
pub fn load_frame(path: impl AsRef<Path>, scale: f64) -> Result<RgbImage, DeviceError> {
    let img = image::ImageReader::open(path)?.decode()?;
    frame_from_image(&img, scale)
}

/// Load the anchor template as grayscale (BT.601, same as frame matching).
pub fn load_template(path: impl AsRef<Path>) -> Result<GrayImage, DeviceError> {
    let rgb = load_frame(path, 1.0)?;
    Ok(rgb_to_gray(&rgb.view()))
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
        .unwrap_or(false)
}

/// Replays PNG/JPEG frames from a directory in file-name order.
#[derive(Debug, Clone)]
pub struct ImageDirSource {
    paths: Vec<PathBuf>,
    next: usize,
    frame_scale: f64,
}

impl ImageDirSource {
    pub fn new(dir: impl AsRef<Path>, frame_scale: f64) -> Result<Self, DeviceError> {
        if !(frame_scale.is_finite() && frame_scale > 0.0) {
            return Err(DeviceError::InvalidFrameScale(frame_scale));
        }
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && is_frame_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        info!("replaying {} frames", paths.len());
        Ok(Self {
            paths,
            next: 0,
            frame_scale,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.paths.len() - self.next
    }
}

impl FrameSource for ImageDirSource {
    fn capture(&mut self) -> Result<RgbImage, DeviceError> {
        let path = self.paths.get(self.next).ok_or(DeviceError::Exhausted)?;
        self.next += 1;
        debug!("frame {}", path.display());
        load_frame(path, self.frame_scale)
    }
}

/// Android device driven through the `adb` command-line tool.
///
/// Captures with `adb exec-out screencap -p` and presses with
/// `adb shell input swipe x y x y ms` (a swipe that does not move is a
/// touch-and-hold).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdbDevice {
    pub adb: PathBuf,
    /// Device serial passed as `-s`; `None` uses the only attached device.
    pub serial: Option<String>,
    pub frame_scale: f64,
}

impl AdbDevice {
    pub fn new(frame_scale: f64) -> Self {
        Self {
            adb: PathBuf::from("adb"),
            serial: None,
            frame_scale,
        }
    }

    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = Some(serial.into());
        self
    }

    pub fn with_adb(mut self, adb: impl Into<PathBuf>) -> Self {
        self.adb = adb.into();
        self
    }

    fn args<'a>(&'a self, tail: &[&'a str]) -> Vec<&'a str> {
        let mut args = Vec::with_capacity(tail.len() + 2);
        if let Some(serial) = self.serial.as_deref() {
            args.extend(["-s", serial]);
        }
        args.extend_from_slice(tail);
        args
    }

    fn run(&self, tail: &[&str]) -> Result<Output, DeviceError> {
        let args = self.args(tail);
        let output = Command::new(&self.adb).args(&args).output()?;
        if !output.status.success() {
            return Err(DeviceError::CommandFailed {
                command: format!("{} {}", self.adb.display(), args.join(" ")),
                detail: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(output)
    }
}

impl FrameSource for AdbDevice {
    fn capture(&mut self) -> Result<RgbImage, DeviceError> {
        let output = self.run(&["exec-out", "screencap", "-p"])?;
        let img = image::load_from_memory(&output.stdout)?;
        frame_from_image(&img, self.frame_scale)
    }
}

impl ActuatorSink for AdbDevice {
    fn press(&mut self, point: [u32; 2], duration_ms: u64) -> Result<(), DeviceError> {
        let (x, y, ms) = (point[0].to_string(), point[1].to_string(), duration_ms.to_string());
        self.run(&[
            "shell",
            "input",
            "swipe",
            x.as_str(),
            y.as_str(),
            x.as_str(),
            y.as_str(),
            ms.as_str(),
        ])?;
        info!("pressed ({}, {}) for {} ms", point[0], point[1], duration_ms);
        Ok(())
    }
}

/// One recorded press.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Press {
    pub point: [u32; 2],
    pub duration_ms: u64,
}

/// Dry-run actuator: logs and records presses without touching a device.
#[derive(Debug, Clone, Default)]
pub struct LogActuator {
    presses: Vec<Press>,
}

impl LogActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn presses(&self) -> &[Press] {
        &self.presses
    }
}

impl ActuatorSink for LogActuator {
    fn press(&mut self, point: [u32; 2], duration_ms: u64) -> Result<(), DeviceError> {
        info!(
            "dry run: press ({}, {}) for {} ms",
            point[0], point[1], duration_ms
        );
        self.presses.push(Press { point, duration_ms });
        Ok(())
    }
}
