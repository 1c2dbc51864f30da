use jumpcal_core::{resize_gray_by, rgb_to_gray, GrayImage, GrayImageView, Point, RgbImageView};
use log::{debug, info};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::ncc::{best_match, TemplateMatch};
use crate::LocateError;

/// Locator settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorParams {
    /// Smallest frame-to-template scale tried during calibration.
    pub scale_min: f64,
    /// Largest frame-to-template scale tried during calibration.
    pub scale_max: f64,
    /// Number of evenly spaced scales, both ends included.
    pub scale_samples: usize,
    /// Contact point height as a fraction of the template height, measured
    /// from the top edge of the match.
    pub contact_y_frac: f64,
}

impl Default for LocatorParams {
    fn default() -> Self {
        Self {
            scale_min: 0.2,
            scale_max: 4.0,
            scale_samples: 30,
            contact_y_frac: 0.9,
        }
    }
}

impl LocatorParams {
    fn validate(&self) -> Result<(), LocateError> {
        let ok = self.scale_min.is_finite()
            && self.scale_max.is_finite()
            && self.scale_min > 0.0
            && self.scale_max >= self.scale_min
            && self.scale_samples > 0
            && self.contact_y_frac.is_finite();
        if ok {
            Ok(())
        } else {
            Err(LocateError::InvalidScaleRange {
                min: self.scale_min,
                max: self.scale_max,
                samples: self.scale_samples,
            })
        }
    }

    /// The scales visited by [`TargetLocator::calibrate_scale`], in order.
    pub fn scales(&self) -> Vec<f64> {
        if self.scale_samples <= 1 {
            return vec![self.scale_min];
        }
        let step = (self.scale_max - self.scale_min) / (self.scale_samples - 1) as f64;
        (0..self.scale_samples)
            .map(|i| self.scale_min + step * i as f64)
            .collect()
    }
}

/// Detected anchor: contact point of the marker plus match confidence.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub position: Point,
    /// Normalized correlation score in `[-1, 1]`.
    pub confidence: f64,
}

/// Outcome of the template-scale sweep.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScaleCalibration {
    /// Winning frame-to-template scale; the template was resized by its inverse.
    pub scale: f64,
    pub confidence: f64,
    /// Number of scales that produced a usable template.
    pub samples_evaluated: usize,
}

/// Template-matching locator for the anchor marker.
///
/// Keeps the reference template as loaded and a working copy resized by
/// `1 / template_scale`, so recalibration always starts from the original.
#[derive(Clone, Debug)]
pub struct TargetLocator {
    params: LocatorParams,
    reference: GrayImage,
    template: GrayImage,
    template_scale: f64,
}

impl TargetLocator {
    pub fn new(template: GrayImage, params: LocatorParams) -> Result<Self, LocateError> {
        params.validate()?;
        if template.is_empty() {
            return Err(LocateError::EmptyTemplate);
        }
        Ok(Self {
            params,
            template: template.clone(),
            reference: template,
            template_scale: 1.0,
        })
    }

    /// Build a locator whose template scale is already known (e.g. loaded
    /// from a persisted calibration).
    pub fn with_template_scale(
        template: GrayImage,
        params: LocatorParams,
        scale: f64,
    ) -> Result<Self, LocateError> {
        let mut locator = Self::new(template, params)?;
        locator.set_template_scale(scale)?;
        Ok(locator)
    }

    pub fn set_template_scale(&mut self, scale: f64) -> Result<(), LocateError> {
        self.template = scaled_template(&self.reference, scale)?;
        self.template_scale = scale;
        Ok(())
    }

    pub fn params(&self) -> &LocatorParams {
        &self.params
    }

    /// Working template (after scale calibration).
    pub fn template(&self) -> &GrayImage {
        &self.template
    }

    pub fn template_scale(&self) -> f64 {
        self.template_scale
    }

    /// Locate the anchor in an RGB frame.
    pub fn locate(&self, frame: &RgbImageView<'_>) -> Result<Anchor, LocateError> {
        let gray = rgb_to_gray(frame);
        self.locate_gray(&gray.view())
    }

    /// Locate the anchor in an already converted grayscale frame.
    ///
    /// No confidence threshold is applied here.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, gray), fields(width = gray.width, height = gray.height))
    )]
    pub fn locate_gray(&self, gray: &GrayImageView<'_>) -> Result<Anchor, LocateError> {
        let m = best_match(gray, &self.template.view())?;
        let anchor = contact_point(&m, self.template.width, self.template.height, &self.params);
        debug!(
            "anchor at ({:.1}, {:.1}) confidence {:.3}",
            anchor.position.x, anchor.position.y, anchor.confidence
        );
        Ok(anchor)
    }

    /// Sweep the configured scale range against a calibration frame and keep
    /// the scale with the highest confidence.
    ///
    /// Scales whose resized template is empty or does not fit in the frame are
    /// skipped. On success the working template is permanently resized to
    /// `1 / scale`.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, frame), fields(width = frame.width, height = frame.height))
    )]
    pub fn calibrate_scale(
        &mut self,
        frame: &RgbImageView<'_>,
    ) -> Result<ScaleCalibration, LocateError> {
        let gray = rgb_to_gray(frame);
        let view = gray.view();

        let mut best: Option<(f64, f64)> = None;
        let mut evaluated = 0usize;
        for scale in self.params.scales() {
            let Some(templ) = resize_gray_by(&self.reference.view(), 1.0 / scale) else {
                continue;
            };
            if templ.width > view.width || templ.height > view.height {
                continue;
            }
            let m = best_match(&view, &templ.view())?;
            evaluated += 1;
            debug!("scale {:.4}: confidence {:.4}", scale, m.score);
            if best.map_or(true, |(_, score)| m.score > score) {
                best = Some((scale, m.score));
            }
        }

        let Some((scale, confidence)) = best else {
            return Err(LocateError::NoUsableScale {
                min: self.params.scale_min,
                max: self.params.scale_max,
            });
        };
        self.set_template_scale(scale)?;
        info!(
            "template scale {:.4} (confidence {:.3}, {} scales tried)",
            scale, confidence, evaluated
        );
        Ok(ScaleCalibration {
            scale,
            confidence,
            samples_evaluated: evaluated,
        })
    }
}

fn scaled_template(reference: &GrayImage, scale: f64) -> Result<GrayImage, LocateError> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(LocateError::InvalidTemplateScale(scale));
    }
    resize_gray_by(&reference.view(), 1.0 / scale).ok_or(LocateError::InvalidTemplateScale(scale))
}

/// Contact point of a match: top-left + (w / 2, contact_y_frac * h).
fn contact_point(m: &TemplateMatch, width: usize, height: usize, params: &LocatorParams) -> Anchor {
    Anchor {
        position: Point::new(
            m.x as f64 + width as f64 / 2.0,
            m.y as f64 + height as f64 * params.contact_y_frac,
        ),
        confidence: m.score,
    }
}
