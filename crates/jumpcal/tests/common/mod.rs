#![allow(dead_code)]

use std::path::Path;

use jumpcal::core::{GrayImage, RgbImage};
use jumpcal::{CalibrationState, JumpConfig, JumpSession, Point};

pub const BACKGROUND: [u8; 3] = [200, 200, 200];
pub const PLATFORM: [u8; 3] = [90, 160, 220];

/// Textured 12x20 anchor marker.
pub fn marker() -> GrayImage {
    GrayImage::from_fn(12, 20, |x, y| {
        let dx = x as f64 - 5.5;
        let dy = y as f64 - 9.5;
        if (dx * dx) / 30.0 + (dy * dy) / 90.0 < 1.0 {
            (30 + 6 * y) as u8
        } else {
            (230 - 8 * x) as u8
        }
    })
}

/// Axis-aligned rectangle `(x, y, width, height)`.
pub type Rect = (usize, usize, usize, usize);

fn inside(rect: Rect, x: usize, y: usize) -> bool {
    x >= rect.0 && y >= rect.1 && x < rect.0 + rect.2 && y < rect.1 + rect.3
}

/// Flat background with the marker pasted at `at` and optional platforms.
pub fn scene(size: (usize, usize), marker: &GrayImage, at: (usize, usize), platforms: &[Rect]) -> RgbImage {
    RgbImage::from_fn(size.0, size.1, |x, y| {
        if inside((at.0, at.1, marker.width, marker.height), x, y) {
            let v = marker.get(x - at.0, y - at.1);
            [v, v, v]
        } else if platforms.iter().any(|&r| inside(r, x, y)) {
            PLATFORM
        } else {
            BACKGROUND
        }
    })
}

/// Marker at (94, 82) so the anchor lands on (100, 100).
pub fn reference_frame(platforms: &[Rect]) -> RgbImage {
    scene((240, 200), &marker(), (94, 82), platforms)
}

pub fn reference_calibration() -> CalibrationState {
    CalibrationState {
        pivot: Some(Point::new(150.0, 80.0)),
        unit_scale: 6.6,
        template_scale: 1.0,
    }
}

/// Config with instant loop timing and refinement as requested.
pub fn test_config(refine: bool) -> JumpConfig {
    let mut config = JumpConfig::default();
    config.region.enabled = refine;
    config.frame_scale = 1.0;
    config.control.jitter_min_ms = 0;
    config.control.jitter_max_ms = 0;
    config.control.settle_ms = 0;
    config.control.idle_ms = 0;
    config
}

pub fn reference_session(config: &JumpConfig) -> JumpSession {
    JumpSession::with_calibration(marker(), config, reference_calibration()).expect("session")
}

pub fn save_rgb(img: &RgbImage, path: &Path) {
    let buf = image::RgbImage::from_raw(img.width as u32, img.height as u32, img.data.clone())
        .expect("buffer size");
    buf.save(path).expect("save png");
}

pub fn save_gray_as_rgb(img: &GrayImage, path: &Path) {
    let rgb = RgbImage::from_fn(img.width, img.height, |x, y| [img.get(x, y); 3]);
    save_rgb(&rgb, path);
}
