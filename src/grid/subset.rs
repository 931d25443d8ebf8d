use std::fmt;
use std::sync::Arc;

use super::bbox::BoundingBox;
use super::gridset::Gridset;
use crate::error::{Result, TilingError};
use crate::humanize::MetaTileSize;
use crate::model::{TilePyramid, TileRange2D};

/// Read-only view of a layer's grid subset, as consumed by
/// [`TilePyramidBuilder`](super::TilePyramidBuilder).
pub trait GridSubset: fmt::Debug + Send + Sync {
    /// Gridset id this subset restricts.
    fn name(&self) -> &str;

    fn min_zoom_level(&self) -> i32;

    fn max_zoom_level(&self) -> i32;

    fn min_cached_zoom_level(&self) -> Option<i32> {
        None
    }

    fn max_cached_zoom_level(&self) -> Option<i32> {
        None
    }

    /// Every tile of the subset's zoom span that intersects `bounds` (the
    /// whole subset when `None`), each level widened to whole metatiles.
    fn tile_pyramid(
        &self,
        meta_tiling: MetaTileSize,
        bounds: Option<&BoundingBox>,
    ) -> Result<TilePyramid>;
}

/// A gridset restricted to an extent and a zoom span.
#[derive(Debug, Clone)]
pub struct GridSubsetInfo {
    gridset: Arc<Gridset>,
    extent: BoundingBox,
    zoom_start: i32,
    zoom_stop: i32,
    min_cached_zoom_level: Option<i32>,
    max_cached_zoom_level: Option<i32>,
}

impl GridSubsetInfo {
    /// Covers the full gridset.
    pub fn new(gridset: Arc<Gridset>) -> Self {
        Self {
            extent: *gridset.extent(),
            zoom_start: 0,
            zoom_stop: gridset.max_zoom_level(),
            min_cached_zoom_level: None,
            max_cached_zoom_level: None,
            gridset,
        }
    }

    pub fn with_extent(mut self, extent: BoundingBox) -> Result<Self> {
        self.extent = self.gridset.extent().intersection(&extent).ok_or_else(|| {
            TilingError::InvalidBounds(format!(
                "{extent} is outside gridset {} extent {}",
                self.gridset.name(),
                self.gridset.extent()
            ))
        })?;
        Ok(self)
    }

    pub fn with_zoom_range(mut self, zoom_start: i32, zoom_stop: i32) -> Result<Self> {
        if zoom_start < 0 || zoom_start > zoom_stop {
            return Err(TilingError::InvalidZoomRange {
                min: zoom_start,
                max: zoom_stop,
            });
        }
        if zoom_stop > self.gridset.max_zoom_level() {
            return Err(TilingError::ZoomLevelOutOfBounds {
                bound: "max",
                requested: zoom_stop,
                allowed: self.gridset.max_zoom_level(),
            });
        }
        self.zoom_start = zoom_start;
        self.zoom_stop = zoom_stop;
        Ok(self)
    }

    pub fn with_cached_zoom_levels(mut self, min: Option<i32>, max: Option<i32>) -> Result<Self> {
        if let Some(min) = min
            && min < self.zoom_start
        {
            return Err(TilingError::ZoomLevelOutOfBounds {
                bound: "min",
                requested: min,
                allowed: self.zoom_start,
            });
        }
        if let Some(max) = max
            && max > self.zoom_stop
        {
            return Err(TilingError::ZoomLevelOutOfBounds {
                bound: "max",
                requested: max,
                allowed: self.zoom_stop,
            });
        }
        if let (Some(min), Some(max)) = (min, max)
            && min > max
        {
            return Err(TilingError::InvalidZoomRange { min, max });
        }
        self.min_cached_zoom_level = min;
        self.max_cached_zoom_level = max;
        Ok(self)
    }

    pub fn gridset(&self) -> &Gridset {
        &self.gridset
    }

    pub fn extent(&self) -> &BoundingBox {
        &self.extent
    }

    /// Covering range at `z`, expanded outward to metatile boundaries and
    /// clamped to the level's matrix.
    fn meta_aligned_coverage(
        &self,
        z: i32,
        area: &BoundingBox,
        meta_tiling: MetaTileSize,
    ) -> Option<TileRange2D> {
        let covered = self.gridset.coverage(z, area)?;
        let matrix = self.gridset.matrix(z)?;
        let (w, h) = (
            i64::from(meta_tiling.width()),
            i64::from(meta_tiling.height()),
        );
        TileRange2D::of(
            covered.minx() - covered.minx() % w,
            covered.miny() - covered.miny() % h,
            (covered.maxx() - covered.maxx() % w + w - 1).min(matrix.maxx()),
            (covered.maxy() - covered.maxy() % h + h - 1).min(matrix.maxy()),
        )
        .ok()
    }
}

impl GridSubset for GridSubsetInfo {
    fn name(&self) -> &str {
        self.gridset.name()
    }

    fn min_zoom_level(&self) -> i32 {
        self.zoom_start
    }

    fn max_zoom_level(&self) -> i32 {
        self.zoom_stop
    }

    fn min_cached_zoom_level(&self) -> Option<i32> {
        self.min_cached_zoom_level
    }

    fn max_cached_zoom_level(&self) -> Option<i32> {
        self.max_cached_zoom_level
    }

    fn tile_pyramid(
        &self,
        meta_tiling: MetaTileSize,
        bounds: Option<&BoundingBox>,
    ) -> Result<TilePyramid> {
        let area = match bounds {
            Some(bounds) => self.extent.intersection(bounds),
            None => Some(self.extent),
        };
        let Some(area) = area else {
            return Ok(TilePyramid::empty());
        };

        TilePyramid::new((self.zoom_start..=self.zoom_stop).filter_map(|z| {
            self.meta_aligned_coverage(z, &area, meta_tiling)
                .map(|tiles| tiles.at(z))
        }))
    }
}
