//! Region growing around a projected landing point.
//!
//! 4-connected flood fill with a floating per-channel range: a pixel joins
//! the region when every channel differs by at most `tolerance` from the
//! filled neighbor it was reached from. Only a mask is built; the frame is
//! never modified.

use std::collections::VecDeque;

use jumpcal_core::{Point, RgbImageView};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionGrowParams {
    pub enabled: bool,
    /// Per-channel tolerance (R, G, B), inclusive.
    pub tolerance: [u8; 3],
}

impl Default for RegionGrowParams {
    fn default() -> Self {
        Self {
            enabled: true,
            tolerance: [4, 4, 4],
        }
    }
}

/// Axis-aligned bounding box of a grown region, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionBounds {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
    /// Number of pixels in the region.
    pub area: usize,
}

impl RegionBounds {
    /// Center of the bounding box: `(x + w / 2, y + h / 2)`.
    pub fn centroid(&self) -> Point {
        Point::new(
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }
}

#[inline]
fn within(a: [u8; 3], b: [u8; 3], tol: [u8; 3]) -> bool {
    (0..3).all(|c| a[c].abs_diff(b[c]) <= tol[c])
}

/// Flood fill from `seed` and return the bounds of the filled region.
///
/// Returns `None` when the seed lies outside the frame.
pub fn grow_region(frame: &RgbImageView<'_>, seed: (usize, usize), tolerance: [u8; 3]) -> Option<RegionBounds> {
    let (w, h) = (frame.width, frame.height);
    if seed.0 >= w || seed.1 >= h {
        return None;
    }

    let mut filled = vec![false; w * h];
    let mut queue = VecDeque::new();
    filled[seed.1 * w + seed.0] = true;
    queue.push_back(seed);

    let (mut min_x, mut min_y, mut max_x, mut max_y) = (seed.0, seed.1, seed.0, seed.1);
    let mut area = 0usize;

    while let Some((x, y)) = queue.pop_front() {
        area += 1;
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);

        let here = frame.pixel(x, y);
        let neighbors = [
            (x.checked_sub(1), Some(y)),
            ((x + 1 < w).then_some(x + 1), Some(y)),
            (Some(x), y.checked_sub(1)),
            (Some(x), (y + 1 < h).then_some(y + 1)),
        ];
        for (nx, ny) in neighbors {
            let (Some(nx), Some(ny)) = (nx, ny) else {
                continue;
            };
            let idx = ny * w + nx;
            if filled[idx] || !within(frame.pixel(nx, ny), here, tolerance) {
                continue;
            }
            filled[idx] = true;
            queue.push_back((nx, ny));
        }
    }

    Some(RegionBounds {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
        area,
    })
}

/// Snap a raw landing point to the centroid of its uniform-color region.
///
/// A point outside the frame (or disabled refinement) is returned unchanged
/// with `None` bounds.
pub fn refine_landing(
    frame: &RgbImageView<'_>,
    raw: Point,
    params: &RegionGrowParams,
) -> (Point, Option<RegionBounds>) {
    if !params.enabled || !frame.contains(raw.x, raw.y) {
        return (raw, None);
    }
    let seed = (raw.x.floor() as usize, raw.y.floor() as usize);
    match grow_region(frame, seed, params.tolerance) {
        Some(bounds) => (bounds.centroid(), Some(bounds)),
        None => (raw, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jumpcal_core::RgbImage;

    fn frame_with_box(x0: usize, y0: usize, x1: usize, y1: usize) -> RgbImage {
        RgbImage::from_fn(60, 40, |x, y| {
            if x >= x0 && x < x1 && y >= y0 && y < y1 {
                [200, 120, 40]
            } else {
                [30, 30, 30]
            }
        })
    }

    #[test]
    fn box_region_snaps_to_its_center() {
        let frame = frame_with_box(10, 5, 30, 15);
        let (p, bounds) = refine_landing(&frame.view(), Point::new(12.7, 6.2), &RegionGrowParams::default());
        let bounds = bounds.expect("refined");
        assert_eq!((bounds.x, bounds.y, bounds.width, bounds.height), (10, 5, 20, 10));
        assert_eq!(bounds.area, 200);
        assert_eq!(p, Point::new(20.0, 10.0));
    }

    #[test]
    fn gradient_within_tolerance_is_followed() {
        // Each column is 3 levels brighter than the previous one: every step is
        // inside the ±4 floating range even though the ends differ by far more.
        let frame = RgbImage::from_fn(50, 4, |x, _| {
            let v = (3 * x) as u8;
            [v, v, v]
        });
        let bounds = grow_region(&frame.view(), (0, 0), [4, 4, 4]).expect("bounds");
        assert_eq!((bounds.width, bounds.height), (50, 4));
    }

    #[test]
    fn step_above_tolerance_stops_growth() {
        let frame = RgbImage::from_fn(10, 3, |x, _| if x < 4 { [100, 100, 100] } else { [100, 105, 100] });
        let bounds = grow_region(&frame.view(), (1, 1), [4, 4, 4]).expect("bounds");
        assert_eq!((bounds.x, bounds.width), (0, 4));
        let bounds = grow_region(&frame.view(), (1, 1), [4, 5, 4]).expect("bounds");
        assert_eq!(bounds.width, 10);
    }

    #[test]
    fn diagonal_neighbors_are_not_connected() {
        let frame = RgbImage::from_fn(3, 3, |x, y| if x == y { [0, 0, 0] } else { [255, 255, 255] });
        let bounds = grow_region(&frame.view(), (0, 0), [4, 4, 4]).expect("bounds");
        assert_eq!(bounds.area, 1);
    }

    #[test]
    fn outside_points_are_returned_unchanged() {
        let frame = frame_with_box(10, 5, 30, 15);
        let params = RegionGrowParams::default();
        for raw in [
            Point::new(-0.5, 10.0),
            Point::new(60.0, 10.0),
            Point::new(20.0, -3.0),
            Point::new(20.0, 40.0),
        ] {
            let (p, bounds) = refine_landing(&frame.view(), raw, &params);
            assert_eq!(p, raw);
            assert!(bounds.is_none());
        }
    }

    #[test]
    fn disabled_refinement_keeps_raw_point() {
        let frame = frame_with_box(10, 5, 30, 15);
        let params = RegionGrowParams {
            enabled: false,
            ..RegionGrowParams::default()
        };
        let raw = Point::new(12.5, 7.5);
        assert_eq!(refine_landing(&frame.view(), raw, &params), (raw, None));
    }
}
