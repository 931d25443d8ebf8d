use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, TilingError};

/// An axis-aligned rectangle in gridset coordinates. Always finite and
/// never inverted; a zero-width or zero-height box is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawBoundingBox")]
pub struct BoundingBox {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBoundingBox {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl TryFrom<RawBoundingBox> for BoundingBox {
    type Error = TilingError;

    fn try_from(raw: RawBoundingBox) -> Result<Self> {
        Self::new(raw.min_x, raw.min_y, raw.max_x, raw.max_y)
    }
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self> {
        if ![min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite()) {
            return Err(TilingError::InvalidBounds(format!(
                "coordinates must be finite: {min_x},{min_y},{max_x},{max_y}"
            )));
        }
        if max_x < min_x || max_y < min_y {
            return Err(TilingError::InvalidBounds(format!(
                "max must be >= min: {min_x},{min_y},{max_x},{max_y}"
            )));
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    /// Caller guarantees finite, non-inverted coordinates.
    pub(crate) const fn new_unchecked(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Builds from `[minx, miny, maxx, maxy]`, the layout used in config files.
    pub fn from_slice(coords: &[f64]) -> Result<Self> {
        match coords {
            [min_x, min_y, max_x, max_y] => Self::new(*min_x, *min_y, *max_x, *max_y),
            _ => Err(TilingError::InvalidBounds(format!(
                "expected 4 coordinates, got {}",
                coords.len()
            ))),
        }
    }

    pub fn min_x(&self) -> f64 {
        self.min_x
    }

    pub fn min_y(&self) -> f64 {
        self.min_y
    }

    pub fn max_x(&self) -> f64 {
        self.max_x
    }

    pub fn max_y(&self) -> f64 {
        self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// The shared area, or `None` when the boxes don't touch.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let min_x = self.min_x.max(other.min_x);
        let min_y = self.min_y.max(other.min_y);
        let max_x = self.max_x.min(other.max_x);
        let max_y = self.max_y.min(other.max_y);
        (min_x <= max_x && min_y <= max_y).then_some(BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && self.max_x >= other.max_x
            && self.max_y >= other.max_y
    }
}

impl FromStr for BoundingBox {
    type Err = TilingError;

    fn from_str(s: &str) -> Result<Self> {
        let coords = s
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| TilingError::InvalidBounds(format!("'{s}': {e}")))?;
        Self::from_slice(&coords)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}
