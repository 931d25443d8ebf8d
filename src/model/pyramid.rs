use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::index::TileIndex3D;
use super::range::{TileRange2D, TileRange3D, check_meta_tile_size};
use crate::error::{Result, TilingError};

/// The addressable tile space of a cache across a span of zoom levels.
///
/// Holds at most one [`TileRange2D`] per zoom level, keyed and iterated in
/// ascending zoom-level order. Serialized as a sorted list of
/// [`TileRange3D`]; duplicate zoom levels are rejected on both construction
/// and deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "RawTilePyramid", try_from = "RawTilePyramid")]
pub struct TilePyramid {
    levels: BTreeMap<i32, TileRange2D>,
}

#[derive(Serialize, Deserialize)]
struct RawTilePyramid {
    ranges: Vec<TileRange3D>,
}

impl From<TilePyramid> for RawTilePyramid {
    fn from(pyramid: TilePyramid) -> Self {
        Self {
            ranges: pyramid.ranges().collect(),
        }
    }
}

impl TryFrom<RawTilePyramid> for TilePyramid {
    type Error = TilingError;

    fn try_from(raw: RawTilePyramid) -> Result<Self> {
        Self::new(raw.ranges)
    }
}

impl TilePyramid {
    pub fn new(ranges: impl IntoIterator<Item = TileRange3D>) -> Result<Self> {
        let mut levels = BTreeMap::new();
        for range in ranges {
            if levels.insert(range.zoom_level(), *range.tiles()).is_some() {
                return Err(TilingError::DuplicateZoomLevel(range.zoom_level()));
            }
        }
        Ok(Self { levels })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn ranges(&self) -> impl Iterator<Item = TileRange3D> + '_ {
        self.levels.iter().map(|(z, tiles)| TileRange3D::new(*z, *tiles))
    }

    pub fn range(&self, zoom_level: i32) -> Option<TileRange3D> {
        self.levels
            .get(&zoom_level)
            .map(|tiles| TileRange3D::new(zoom_level, *tiles))
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn min_zoom_level(&self) -> Option<i32> {
        self.levels.keys().next().copied()
    }

    pub fn max_zoom_level(&self) -> Option<i32> {
        self.levels.keys().next_back().copied()
    }

    pub fn count(&self) -> BigUint {
        self.levels.values().map(TileRange2D::count).sum()
    }

    pub fn count_meta_tiles(&self, width: u32, height: u32) -> Result<BigUint> {
        check_meta_tile_size(width, height)?;
        self.levels
            .values()
            .map(|tiles| tiles.count_meta_tiles(width, height))
            .sum()
    }

    /// Every tile, ascending zoom level, row-major within a level.
    pub fn as_tiles(&self) -> impl Iterator<Item = TileIndex3D> + '_ {
        self.ranges().flat_map(|range| range.as_tiles())
    }

    pub fn as_meta_tiles(
        &self,
        width: u32,
        height: u32,
    ) -> Result<impl Iterator<Item = TileRange3D> + '_> {
        check_meta_tile_size(width, height)?;
        Ok(self.levels.iter().flat_map(move |(z, tiles)| {
            let z = *z;
            tiles
                .as_meta_tiles(width, height)
                .into_iter()
                .flatten()
                .map(move |block| block.at(z))
        }))
    }

    /// Ranges with `min_zoom <= zoom level <= max_zoom`.
    pub fn subset(&self, min_zoom: i32, max_zoom: i32) -> Result<TilePyramid> {
        if min_zoom < 0 || min_zoom > max_zoom {
            return Err(TilingError::InvalidZoomRange {
                min: min_zoom,
                max: max_zoom,
            });
        }
        let levels = self
            .levels
            .range(min_zoom..=max_zoom)
            .map(|(z, tiles)| (*z, *tiles))
            .collect();
        Ok(Self { levels })
    }

    pub fn from_level(&self, min_zoom: i32) -> Result<TilePyramid> {
        self.subset(min_zoom, i32::MAX)
    }

    pub fn to_level(&self, max_zoom: i32) -> Result<TilePyramid> {
        self.subset(0, max_zoom)
    }

    /// True when the pyramid addresses no tiles. Every stored range holds at
    /// least one tile, so this is the same as holding no ranges.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}
