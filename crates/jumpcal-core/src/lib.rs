//! Core types shared by the jumpcal crates.
//!
//! Plain 8-bit image buffers, the jump [`Direction`], and logger setup. The
//! crate does not depend on any image decoding library.

mod direction;
mod image;
mod logger;

pub use direction::{Direction, ParseDirectionError};
pub use image::{
    luma_bt601, resize_gray, resize_gray_by, rgb_to_gray, sample_bilinear, scaled_size,
    GrayImage, GrayImageView, ImageError, RgbImage, RgbImageView,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, workspace_directives};

/// Frame-space point: x to the right, y downward, in pixels.
pub type Point = nalgebra::Point2<f64>;
