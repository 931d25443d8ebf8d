use tracing::debug;

use super::bbox::BoundingBox;
use super::layer::TileLayerInfo;
use crate::error::{Result, TilingError};
use crate::model::TilePyramid;

/// Builds the [`TilePyramid`] a cache job covers for one layer and gridset.
///
/// Requested zoom levels must fall inside the grid subset's cached zoom
/// levels. Without configured cached levels the lower bound is 0 and the upper
/// bound is the subset's max zoom level. When no zoom level is requested the
/// cached level, or else the subset's own zoom span, is used.
///
/// ```
/// use std::sync::Arc;
/// use tilebox::grid::{Gridset, GridSubsetInfo, TileLayerInfo, TilePyramidBuilder};
/// use tilebox::humanize::MetaTileSize;
///
/// let layer = TileLayerInfo::new("roads", MetaTileSize::SINGLE)
///     .with_grid_subset(GridSubsetInfo::new(Arc::new(Gridset::world_epsg4326())));
///
/// let pyramid = TilePyramidBuilder::new(&layer)
///     .gridset("EPSG:4326")
///     .max_zoom_level(1)
///     .build()
///     .unwrap();
/// assert_eq!(pyramid.count().to_string(), "10");
/// ```
#[derive(Debug, Clone)]
pub struct TilePyramidBuilder<'a> {
    layer: &'a TileLayerInfo,
    gridset_id: Option<String>,
    bounds: Option<BoundingBox>,
    min_zoom_level: Option<i32>,
    max_zoom_level: Option<i32>,
}

impl<'a> TilePyramidBuilder<'a> {
    pub fn new(layer: &'a TileLayerInfo) -> Self {
        Self {
            layer,
            gridset_id: None,
            bounds: None,
            min_zoom_level: None,
            max_zoom_level: None,
        }
    }

    pub fn gridset(mut self, gridset_id: impl Into<String>) -> Self {
        self.gridset_id = Some(gridset_id.into());
        self
    }

    pub fn bounds(self, bounds: BoundingBox) -> Self {
        self.maybe_bounds(Some(bounds))
    }

    pub fn maybe_bounds(mut self, bounds: Option<BoundingBox>) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn min_zoom_level(self, zoom_level: i32) -> Self {
        self.maybe_min_zoom_level(Some(zoom_level))
    }

    pub fn maybe_min_zoom_level(mut self, zoom_level: Option<i32>) -> Self {
        self.min_zoom_level = zoom_level;
        self
    }

    pub fn max_zoom_level(self, zoom_level: i32) -> Self {
        self.maybe_max_zoom_level(Some(zoom_level))
    }

    pub fn maybe_max_zoom_level(mut self, zoom_level: Option<i32>) -> Self {
        self.max_zoom_level = zoom_level;
        self
    }

    pub fn build(&self) -> Result<TilePyramid> {
        self.check_requested_zoom_levels()?;

        let gridset_id = self
            .gridset_id
            .as_deref()
            .ok_or(TilingError::MissingField("gridsetId"))?;
        let subset = self.layer.grid_subset(gridset_id).ok_or_else(|| {
            TilingError::GridSubsetNotFound {
                layer: self.layer.name().to_string(),
                gridset: gridset_id.to_string(),
            }
        })?;

        let allowed_min = subset.min_cached_zoom_level().unwrap_or(0);
        let default_min = subset
            .min_cached_zoom_level()
            .unwrap_or(subset.min_zoom_level());
        let allowed_max = subset
            .max_cached_zoom_level()
            .unwrap_or(subset.max_zoom_level());

        let min = match self.min_zoom_level {
            Some(requested) if requested < allowed_min => {
                return Err(TilingError::ZoomLevelOutOfBounds {
                    bound: "min",
                    requested,
                    allowed: allowed_min,
                });
            }
            Some(requested) => requested,
            None => default_min,
        };
        let max = match self.max_zoom_level {
            Some(requested) if requested > allowed_max => {
                return Err(TilingError::ZoomLevelOutOfBounds {
                    bound: "max",
                    requested,
                    allowed: allowed_max,
                });
            }
            Some(requested) => requested,
            None => allowed_max,
        };
        if min > max {
            return Err(TilingError::InvalidZoomRange { min, max });
        }

        debug!(
            layer = self.layer.name(),
            gridset = gridset_id,
            min_zoom = min,
            max_zoom = max,
            meta_tiling = %self.layer.meta_tiling(),
            "Building tile pyramid"
        );

        subset
            .tile_pyramid(self.layer.meta_tiling(), self.bounds.as_ref())?
            .subset(min, max)
    }

    /// Rejects requests that are malformed on their own, before any grid
    /// subset lookup.
    fn check_requested_zoom_levels(&self) -> Result<()> {
        match (self.min_zoom_level, self.max_zoom_level) {
            (Some(min), max) if min < 0 => Err(TilingError::InvalidZoomRange {
                min,
                max: max.unwrap_or(min),
            }),
            (min, Some(max)) if max < 0 => Err(TilingError::InvalidZoomRange {
                min: min.unwrap_or(max),
                max,
            }),
            (Some(min), Some(max)) if min > max => Err(TilingError::InvalidZoomRange { min, max }),
            _ => Ok(()),
        }
    }
}
