//! Owned and borrowed 8-bit image buffers.
//!
//! Frames are row-major interleaved RGB, templates are row-major grayscale.
//! Nothing here depends on a concrete image crate; the facade converts from
//! `image::RgbImage` at the boundary.

/// Errors raised when building an image from raw parts.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("invalid image buffer length (expected {expected} bytes, got {got})")]
    InvalidBuffer { expected: usize, got: usize },

    #[error("invalid image dimensions (width={width}, height={height})")]
    InvalidDimensions { width: usize, height: usize },
}

fn checked_len(width: usize, height: usize, channels: usize) -> Result<usize, ImageError> {
    if width == 0 || height == 0 {
        return Err(ImageError::InvalidDimensions { width, height });
    }
    width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(channels))
        .ok_or(ImageError::InvalidDimensions { width, height })
}

#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

impl GrayImageView<'_> {
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Self, ImageError> {
        let expected = checked_len(width, height, 1)?;
        if data.len() != expected {
            return Err(ImageError::InvalidBuffer {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> u8) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RgbImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major RGB, len = w*h*3
}

impl RgbImageView<'_> {
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    #[inline]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= 0.0 && y >= 0.0 && x < self.width as f64 && y < self.height as f64
    }
}

/// One captured frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgbImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl RgbImage {
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Self, ImageError> {
        let expected = checked_len(width, height, 3)?;
        if data.len() != expected {
            return Err(ImageError::InvalidBuffer {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn view(&self) -> RgbImageView<'_> {
        RgbImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        self.view().pixel(x, y)
    }

    pub fn put_pixel(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        let i = (y * self.width + x) * 3;
        self.data[i..i + 3].copy_from_slice(&rgb);
    }
}

/// BT.601 luma, rounded to nearest.
#[inline]
pub fn luma_bt601(rgb: [u8; 3]) -> u8 {
    let [r, g, b] = rgb.map(u32::from);
    ((299 * r + 587 * g + 114 * b + 500) / 1000) as u8
}

pub fn rgb_to_gray(src: &RgbImageView<'_>) -> GrayImage {
    let data = src.data.chunks_exact(3).map(|p| luma_bt601([p[0], p[1], p[2]])).collect();
    GrayImage {
        width: src.width,
        height: src.height,
        data,
    }
}

#[inline]
fn get_clamped(src: &GrayImageView<'_>, x: i64, y: i64) -> u8 {
    let xc = x.clamp(0, src.width as i64 - 1) as usize;
    let yc = y.clamp(0, src.height as i64 - 1) as usize;
    src.data[yc * src.width + xc]
}

/// Bilinear sample with edge replication.
#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f64, y: f64) -> f64 {
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = get_clamped(src, x0, y0) as f64;
    let p10 = get_clamped(src, x0 + 1, y0) as f64;
    let p01 = get_clamped(src, x0, y0 + 1) as f64;
    let p11 = get_clamped(src, x0 + 1, y0 + 1) as f64;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

/// Size of an image scaled by `scale`, truncated toward zero.
pub fn scaled_size(width: usize, height: usize, scale: f64) -> (usize, usize) {
    if !(scale.is_finite() && scale > 0.0) {
        return (0, 0);
    }
    (
        (width as f64 * scale).floor() as usize,
        (height as f64 * scale).floor() as usize,
    )
}

/// Resize with bilinear interpolation and pixel-center alignment.
///
/// Returns `None` when the target size is empty.
pub fn resize_gray(src: &GrayImageView<'_>, width: usize, height: usize) -> Option<GrayImage> {
    if width == 0 || height == 0 || src.width == 0 || src.height == 0 {
        return None;
    }
    let sx = src.width as f64 / width as f64;
    let sy = src.height as f64 / height as f64;
    Some(GrayImage::from_fn(width, height, |x, y| {
        let u = (x as f64 + 0.5) * sx - 0.5;
        let v = (y as f64 + 0.5) * sy - 0.5;
        sample_bilinear(src, u, v).round().clamp(0.0, 255.0) as u8
    }))
}

/// Resize by a uniform factor; see [`scaled_size`].
pub fn resize_gray_by(src: &GrayImageView<'_>, scale: f64) -> Option<GrayImage> {
    let (w, h) = scaled_size(src.width, src.height, scale);
    resize_gray(src, w, h)
}
