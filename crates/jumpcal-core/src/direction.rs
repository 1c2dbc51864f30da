use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Horizontal jump direction.
///
/// A session starts with `Right` as its prior direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    #[default]
    Right,
}

impl Direction {
    /// Jump direction for an anchor at `anchor_x` around `pivot_x`.
    ///
    /// The landing lies on the far side of the pivot, so an anchor left of
    /// the pivot jumps right. The sign follows `pivot_x - anchor_x`; an
    /// anchor exactly above or below the pivot resolves to `Right`.
    #[inline]
    pub fn from_pivot(pivot_x: f64, anchor_x: f64) -> Self {
        if anchor_x > pivot_x {
            Direction::Left
        } else {
            Direction::Right
        }
    }

    /// `-1` for left, `+1` for right (screen x axis).
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Direction::Left => -1.0,
            Direction::Right => 1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Left => "left",
            Direction::Right => "right",
        })
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown direction {0:?} (expected \"left\" or \"right\")")]
pub struct ParseDirectionError(pub String);

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(Direction::Left),
            "right" | "r" => Ok(Direction::Right),
            _ => Err(ParseDirectionError(s.to_string())),
        }
    }
}
