use std::f64::consts::{FRAC_PI_2, PI};

use jumpcal_core::{Direction, Point, RgbImageView};
use jumpcal_locator::Anchor;
use log::debug;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::calibration::{CalibrationNotPerformed, CalibrationState};
use crate::region::{refine_landing, RegionGrowParams};
use crate::takeoff::{TakeoffAngles, TakeoffParams};
use crate::ParamsError;

/// Horizontal deltas below this are treated as a vertically aligned anchor.
const MIN_DX: f64 = 1e-9;

/// Landing estimate for one cycle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryResult {
    pub anchor: Point,
    /// Locator confidence of the anchor.
    pub confidence: f64,
    /// Projected landing point before region growing.
    pub raw_landing: Point,
    pub landing: Point,
    /// Pixel distance between `anchor` and `landing`.
    pub distance: f64,
    /// Pivot-to-landing distance used for the projection.
    pub corrected_distance: f64,
    pub direction: Direction,
    pub turned: bool,
    pub refined: bool,
}

/// Pure geometric part of an estimate (no frame access).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    pub direction: Direction,
    pub turned: bool,
    /// Straight-line pivot-to-anchor distance.
    pub distance: f64,
    pub corrected_distance: f64,
    pub landing: Point,
}

/// Angle between the pivot-to-anchor line and the horizontal, in `[0, π/2]`.
///
/// A vertically aligned anchor gives `π/2`; a coincident one gives 0.
pub fn angle_to_anchor(dx: f64, dy: f64) -> f64 {
    if dx.abs() < MIN_DX {
        if dy.abs() < MIN_DX {
            0.0
        } else {
            FRAC_PI_2
        }
    } else {
        (dy.abs() / dx.abs()).atan()
    }
}

/// Distance correction applied when the jump direction reverses.
///
/// `a1 = angle_to_anchor + takeoff(new)`, `d1 = dist · sin(a1)`, then
/// `d1 / sin(total)` with `total` the sum of both takeoff angles (folded to
/// `π − total` past the right angle). With both takeoff angles zero there is
/// nothing to correct and `dist` is returned.
pub fn turn_corrected_distance(
    dist: f64,
    angle_to_anchor: f64,
    new_direction: Direction,
    angles: &TakeoffAngles,
) -> f64 {
    let a1 = angle_to_anchor + angles.get(new_direction).radians;
    let d1 = dist * a1.sin();
    let total = angles.total();
    let denom = if total < FRAC_PI_2 {
        total.sin()
    } else {
        (PI - total).sin()
    };
    if denom.abs() < f64::EPSILON {
        return dist;
    }
    d1 / denom
}

/// Project `dist` from the pivot along the takeoff angle of `direction`.
///
/// Screen y grows downward, so both directions move up.
pub fn project_from_pivot(
    pivot: Point,
    dist: f64,
    direction: Direction,
    angles: &TakeoffAngles,
) -> Point {
    let a = angles.get(direction);
    Point::new(
        pivot.x + direction.sign() * dist * a.cos,
        pivot.y - dist * a.sin,
    )
}

/// Landing-point estimator: turn correction, projection, region growing.
#[derive(Clone, Debug)]
pub struct TrajectoryEstimator {
    angles: TakeoffAngles,
    region: RegionGrowParams,
}

impl TrajectoryEstimator {
    pub fn new(takeoff: &TakeoffParams, region: RegionGrowParams) -> Result<Self, ParamsError> {
        Ok(Self {
            angles: TakeoffAngles::new(takeoff)?,
            region,
        })
    }

    pub fn angles(&self) -> &TakeoffAngles {
        &self.angles
    }

    pub fn region_params(&self) -> &RegionGrowParams {
        &self.region
    }

    /// Direction, turn flag and raw landing point for an anchor.
    pub fn project(&self, anchor: Point, pivot: Point, prior: Direction) -> Projection {
        let dx = anchor.x - pivot.x;
        let dy = anchor.y - pivot.y;
        let distance = dx.hypot(dy);
        let direction = Direction::from_pivot(pivot.x, anchor.x);
        let turned = direction != prior;

        let corrected_distance = if turned {
            turn_corrected_distance(distance, angle_to_anchor(dx, dy), direction, &self.angles)
        } else {
            distance
        };

        Projection {
            direction,
            turned,
            distance,
            corrected_distance,
            landing: project_from_pivot(pivot, corrected_distance, direction, &self.angles),
        }
    }

    /// Full estimate from an explicit pivot, without calibration checks.
    ///
    /// Used by the calibration bootstrap, which runs before a unit scale
    /// exists.
    pub fn estimate_from_pivot(
        &self,
        frame: &RgbImageView<'_>,
        anchor: &Anchor,
        pivot: Point,
        prior: Direction,
    ) -> TrajectoryResult {
        let proj = self.project(anchor.position, pivot, prior);
        let (landing, bounds) = refine_landing(frame, proj.landing, &self.region);
        debug!(
            "{} jump{}: {:.2}px -> {:.2}px, raw ({:.1}, {:.1}) landing ({:.1}, {:.1})",
            proj.direction,
            if proj.turned { " (turn)" } else { "" },
            proj.distance,
            proj.corrected_distance,
            proj.landing.x,
            proj.landing.y,
            landing.x,
            landing.y
        );
        TrajectoryResult {
            anchor: anchor.position,
            confidence: anchor.confidence,
            raw_landing: proj.landing,
            landing,
            distance: nalgebra::distance(&anchor.position, &landing),
            corrected_distance: proj.corrected_distance,
            direction: proj.direction,
            turned: proj.turned,
            refined: bounds.is_some(),
        }
    }

    /// Estimate the landing point using a populated calibration.
    ///
    /// Fails before touching the frame when the calibration is incomplete.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame, anchor, calibration), fields(prior = %prior))
    )]
    pub fn estimate(
        &self,
        frame: &RgbImageView<'_>,
        anchor: &Anchor,
        calibration: &CalibrationState,
        prior: Direction,
    ) -> Result<TrajectoryResult, CalibrationNotPerformed> {
        let calibrated = calibration.require()?;
        Ok(self.estimate_from_pivot(frame, anchor, calibrated.pivot, prior))
    }
}
