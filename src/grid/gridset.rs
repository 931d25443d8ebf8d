use serde::Serialize;

use super::bbox::BoundingBox;
use crate::error::{Result, TilingError};
use crate::model::TileRange2D;

pub const EPSG_4326: &str = "EPSG:4326";
pub const EPSG_900913: &str = "EPSG:900913";

const MERCATOR_BOUND: f64 = 20_037_508.34;

/// A named tile matrix set.
///
/// Level 0 is a `tiles_wide × tiles_high` matrix over `extent`; every further
/// level doubles both axes. Tile `(0, 0)` sits at the lower-left corner.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Gridset {
    name: String,
    srs: Option<String>,
    extent: BoundingBox,
    tiles_wide: u64,
    tiles_high: u64,
    levels: u32,
}

impl Gridset {
    pub fn new(
        name: impl Into<String>,
        extent: BoundingBox,
        tiles_wide: u64,
        tiles_high: u64,
        levels: u32,
    ) -> Result<Self> {
        let name = name.into();
        let invalid = |reason: String| TilingError::InvalidGridset {
            name: name.clone(),
            reason,
        };

        if name.trim().is_empty() {
            return Err(TilingError::MissingField("name"));
        }
        if tiles_wide == 0 || tiles_high == 0 {
            return Err(invalid(format!(
                "level 0 matrix must be at least 1x1, got {tiles_wide}x{tiles_high}"
            )));
        }
        if levels == 0 {
            return Err(invalid("must have at least one zoom level".into()));
        }
        if extent.width() <= 0.0 || extent.height() <= 0.0 {
            return Err(invalid(format!("extent {extent} has no area")));
        }
        let deepest = levels - 1;
        if matrix_side(tiles_wide, deepest).is_none() || matrix_side(tiles_high, deepest).is_none()
        {
            return Err(invalid(format!(
                "{levels} levels overflow the tile index space"
            )));
        }

        Ok(Self {
            name,
            srs: None,
            extent,
            tiles_wide,
            tiles_high,
            levels,
        })
    }

    pub fn with_srs(mut self, srs: impl Into<String>) -> Self {
        self.srs = Some(srs.into());
        self
    }

    /// Plate carrée world grid: two square tiles at level 0.
    pub fn world_epsg4326() -> Self {
        Self {
            name: EPSG_4326.to_string(),
            srs: Some(EPSG_4326.to_string()),
            extent: BoundingBox::new_unchecked(-180.0, -90.0, 180.0, 90.0),
            tiles_wide: 2,
            tiles_high: 1,
            levels: 22,
        }
    }

    /// Spherical mercator world grid: a single tile at level 0.
    pub fn world_epsg900913() -> Self {
        Self {
            name: EPSG_900913.to_string(),
            srs: Some(EPSG_900913.to_string()),
            extent: BoundingBox::new_unchecked(
                -MERCATOR_BOUND,
                -MERCATOR_BOUND,
                MERCATOR_BOUND,
                MERCATOR_BOUND,
            ),
            tiles_wide: 1,
            tiles_high: 1,
            levels: 31,
        }
    }

    pub fn builtins() -> [Gridset; 2] {
        [Self::world_epsg4326(), Self::world_epsg900913()]
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn srs(&self) -> Option<&str> {
        self.srs.as_deref()
    }

    pub fn extent(&self) -> &BoundingBox {
        &self.extent
    }

    pub fn levels(&self) -> u32 {
        self.levels
    }

    pub fn max_zoom_level(&self) -> i32 {
        i32::try_from(self.levels - 1).unwrap_or(i32::MAX)
    }

    fn level(&self, z: i32) -> Option<u32> {
        u32::try_from(z).ok().filter(|z| *z < self.levels)
    }

    /// Matrix dimensions `(wide, high)` at a zoom level.
    pub fn matrix_size(&self, z: i32) -> Option<(i64, i64)> {
        let z = self.level(z)?;
        Some((
            matrix_side(self.tiles_wide, z)?,
            matrix_side(self.tiles_high, z)?,
        ))
    }

    /// Every tile of a zoom level.
    pub fn matrix(&self, z: i32) -> Option<TileRange2D> {
        let (wide, high) = self.matrix_size(z)?;
        TileRange2D::of(0, 0, wide - 1, high - 1).ok()
    }

    /// Tiles touched by `area` at zoom level `z`, clamped to the matrix.
    /// `None` when the level doesn't exist or `area` misses the extent.
    pub fn coverage(&self, z: i32, area: &BoundingBox) -> Option<TileRange2D> {
        let (wide, high) = self.matrix_size(z)?;
        let area = self.extent.intersection(area)?;

        let tile_w = self.extent.width() / wide as f64;
        let tile_h = self.extent.height() / high as f64;

        let (minx, maxx) = axis_cover(
            area.min_x() - self.extent.min_x(),
            area.max_x() - self.extent.min_x(),
            tile_w,
            wide,
        );
        let (miny, maxy) = axis_cover(
            area.min_y() - self.extent.min_y(),
            area.max_y() - self.extent.min_y(),
            tile_h,
            high,
        );
        TileRange2D::of(minx, miny, maxx, maxy).ok()
    }
}

fn matrix_side(level0: u64, z: u32) -> Option<i64> {
    let scale = 1u64.checked_shl(z).filter(|_| z < 63)?;
    level0
        .checked_mul(scale)
        .and_then(|side| i64::try_from(side).ok())
}

/// Offsets from the origin to the first/last tile index along one axis.
fn axis_cover(from: f64, to: f64, tile_size: f64, tiles: i64) -> (i64, i64) {
    let last = tiles - 1;
    let min = ((from / tile_size).floor() as i64).clamp(0, last);
    let max = (((to / tile_size).ceil() as i64) - 1).clamp(min, last);
    (min, max)
}
