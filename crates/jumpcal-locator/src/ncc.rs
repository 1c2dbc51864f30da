//! Zero-mean normalized cross-correlation (`TM_CCOEFF_NORMED`).
//!
//! `R(x, y) = Σ T'·I' / sqrt(Σ T'² · Σ I'²)` where `T'` is the template minus
//! its mean and `I'` is the image window minus the window mean. Because
//! `Σ T' = 0`, the numerator reduces to `Σ T'·I`; window sums come from
//! integral images.

use jumpcal_core::GrayImageView;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::LocateError;

/// Variance floor below which a window (or the template) counts as flat.
/// Sums are over integer intensities, so any non-flat patch is far above it.
const FLAT_EPS: f64 = 1e-6;

/// Best-scoring placement of a template inside an image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TemplateMatch {
    /// Top-left corner of the template placement, in image pixels.
    pub x: usize,
    pub y: usize,
    /// Correlation score in `[-1, 1]`.
    pub score: f64,
}

struct IntegralImages {
    stride: usize,
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl IntegralImages {
    fn new(img: &GrayImageView<'_>) -> Self {
        let stride = img.width + 1;
        let mut sum = vec![0.0; stride * (img.height + 1)];
        let mut sum_sq = vec![0.0; stride * (img.height + 1)];
        for y in 0..img.height {
            let mut row = 0.0;
            let mut row_sq = 0.0;
            for x in 0..img.width {
                let v = img.get(x, y) as f64;
                row += v;
                row_sq += v * v;
                let i = (y + 1) * stride + x + 1;
                sum[i] = sum[i - stride] + row;
                sum_sq[i] = sum_sq[i - stride] + row_sq;
            }
        }
        Self {
            stride,
            sum,
            sum_sq,
        }
    }

    #[inline]
    fn window(&self, x: usize, y: usize, w: usize, h: usize) -> (f64, f64) {
        let s = self.stride;
        let (a, b, c, d) = (y * s + x, y * s + x + w, (y + h) * s + x, (y + h) * s + x + w);
        (
            self.sum[d] - self.sum[b] - self.sum[c] + self.sum[a],
            self.sum_sq[d] - self.sum_sq[b] - self.sum_sq[c] + self.sum_sq[a],
        )
    }
}

/// Slide `templ` over `img` and return the highest-scoring placement.
///
/// Ties keep the first placement in raster order. Flat windows and a flat
/// template score 0.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "debug",
        skip(img, templ),
        fields(width = img.width, height = img.height, tw = templ.width, th = templ.height)
    )
)]
pub fn best_match(
    img: &GrayImageView<'_>,
    templ: &GrayImageView<'_>,
) -> Result<TemplateMatch, LocateError> {
    let (tw, th) = (templ.width, templ.height);
    if tw == 0 || th == 0 {
        return Err(LocateError::EmptyTemplate);
    }
    if tw > img.width || th > img.height {
        return Err(LocateError::TemplateTooLarge {
            template: [tw, th],
            frame: [img.width, img.height],
        });
    }

    let n = (tw * th) as f64;
    let t_mean = templ.data.iter().map(|&v| v as f64).sum::<f64>() / n;
    let centered: Vec<f64> = templ.data.iter().map(|&v| v as f64 - t_mean).collect();
    let t_norm: f64 = centered.iter().map(|v| v * v).sum();

    let integral = IntegralImages::new(img);
    let mut best = TemplateMatch {
        x: 0,
        y: 0,
        score: f64::NEG_INFINITY,
    };

    for y in 0..=(img.height - th) {
        for x in 0..=(img.width - tw) {
            let score = if t_norm < FLAT_EPS {
                0.0
            } else {
                let (sum, sum_sq) = integral.window(x, y, tw, th);
                let var = sum_sq - sum * sum / n;
                if var < FLAT_EPS {
                    0.0
                } else {
                    let mut num = 0.0;
                    for ty in 0..th {
                        let row = &img.data[(y + ty) * img.width + x..][..tw];
                        let trow = &centered[ty * tw..][..tw];
                        num += row
                            .iter()
                            .zip(trow)
                            .map(|(&p, &t)| p as f64 * t)
                            .sum::<f64>();
                    }
                    (num / (t_norm * var).sqrt()).clamp(-1.0, 1.0)
                }
            };
            if score > best.score {
                best = TemplateMatch { x, y, score };
            }
        }
    }

    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use jumpcal_core::GrayImage;

    fn textured(width: usize, height: usize) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| ((x * 37 + y * 91 + x * y * 7) % 251) as u8)
    }

    fn crop(img: &GrayImage, x0: usize, y0: usize, w: usize, h: usize) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| img.get(x0 + x, y0 + y))
    }

    #[test]
    fn finds_exact_crop_with_unit_score() {
        let img = textured(40, 30);
        let templ = crop(&img, 13, 9, 7, 5);
        let m = best_match(&img.view(), &templ.view()).expect("match");
        assert_eq!((m.x, m.y), (13, 9));
        assert_abs_diff_eq!(m.score, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn score_is_invariant_to_gain_and_offset() {
        let img = textured(32, 32);
        let templ = crop(&img, 4, 20, 6, 6);
        let brighter = GrayImage::from_fn(6, 6, |x, y| templ.get(x, y) / 2 + 40);
        let m = best_match(&img.view(), &brighter.view()).expect("match");
        assert_eq!((m.x, m.y), (4, 20));
        assert!(m.score > 0.99, "score {}", m.score);
    }

    #[test]
    fn flat_windows_outscore_anticorrelated_placement() {
        let img = GrayImage::from_fn(8, 1, |x, _| if x < 4 { 0 } else { 200 });
        let templ = GrayImage::from_fn(2, 1, |x, _| if x == 0 { 200 } else { 0 });
        let m = best_match(&img.view(), &templ.view()).expect("match");
        // Only the window at x=3 has texture and it correlates at -1.
        assert_eq!((m.x, m.y), (0, 0));
        assert_eq!(m.score, 0.0);
    }

    #[test]
    fn flat_template_scores_zero() {
        let img = textured(10, 10);
        let templ = GrayImage::from_fn(3, 3, |_, _| 9);
        let m = best_match(&img.view(), &templ.view()).expect("match");
        assert_eq!(m.score, 0.0);
        assert_eq!((m.x, m.y), (0, 0));
    }

    #[test]
    fn rejects_oversized_template() {
        let img = textured(5, 5);
        let templ = textured(6, 2);
        assert!(matches!(
            best_match(&img.view(), &templ.view()),
            Err(LocateError::TemplateTooLarge { .. })
        ));
    }
}
