use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::FusedIterator;

use super::index::{TileIndex2D, TileIndex3D};
use crate::error::{Result, TilingError};

/// Inclusive rectangle of tile indices within one zoom level.
///
/// `upper_right` is never below `lower_left` on either axis; this is checked
/// at construction and again when deserializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawTileRange2D")]
pub struct TileRange2D {
    lower_left: TileIndex2D,
    upper_right: TileIndex2D,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTileRange2D {
    lower_left: TileIndex2D,
    upper_right: TileIndex2D,
}

impl TryFrom<RawTileRange2D> for TileRange2D {
    type Error = TilingError;

    fn try_from(raw: RawTileRange2D) -> Result<Self> {
        Self::new(raw.lower_left, raw.upper_right)
    }
}

impl TileRange2D {
    pub fn new(lower_left: TileIndex2D, upper_right: TileIndex2D) -> Result<Self> {
        verify(lower_left, upper_right)?;
        Ok(Self {
            lower_left,
            upper_right,
        })
    }

    pub fn of(minx: i64, miny: i64, maxx: i64, maxy: i64) -> Result<Self> {
        Self::new(TileIndex2D::of(minx, miny), TileIndex2D::of(maxx, maxy))
    }

    pub fn lower_left(&self) -> TileIndex2D {
        self.lower_left
    }

    pub fn upper_right(&self) -> TileIndex2D {
        self.upper_right
    }

    pub fn minx(&self) -> i64 {
        self.lower_left.x()
    }

    pub fn miny(&self) -> i64 {
        self.lower_left.y()
    }

    pub fn maxx(&self) -> i64 {
        self.upper_right.x()
    }

    pub fn maxy(&self) -> i64 {
        self.upper_right.y()
    }

    /// Columns in the range. A full `i64` axis spans 2^64 tiles.
    pub fn span_x(&self) -> u128 {
        u128::from(self.maxx().abs_diff(self.minx())) + 1
    }

    pub fn span_y(&self) -> u128 {
        u128::from(self.maxy().abs_diff(self.miny())) + 1
    }

    /// Total number of tiles in the range.
    pub fn count(&self) -> BigUint {
        BigUint::from(self.span_x()) * BigUint::from(self.span_y())
    }

    pub fn contains(&self, tile: TileIndex2D) -> bool {
        (self.minx()..=self.maxx()).contains(&tile.x())
            && (self.miny()..=self.maxy()).contains(&tile.y())
    }

    /// Traverses every tile in row-major order: all of `x` for the lowest
    /// `y`, then the next row up.
    ///
    /// Each call starts an independent traversal.
    pub fn as_tiles(&self) -> Tiles {
        Tiles {
            range: *self,
            next: Some(self.lower_left),
        }
    }

    /// Splits the range into blocks of at most `width` × `height` tiles,
    /// row-major from the lower-left corner. Blocks on the upper and right
    /// edges are clipped to the range, never padded.
    pub fn as_meta_tiles(&self, width: u32, height: u32) -> Result<MetaTiles> {
        check_meta_tile_size(width, height)?;
        Ok(MetaTiles {
            range: *self,
            width,
            height,
            next: Some(self.lower_left),
        })
    }

    /// Number of blocks [`as_meta_tiles`](Self::as_meta_tiles) produces for
    /// the same arguments, computed without enumerating them.
    pub fn count_meta_tiles(&self, width: u32, height: u32) -> Result<BigUint> {
        check_meta_tile_size(width, height)?;
        let meta_x = self.span_x().div_ceil(u128::from(width));
        let meta_y = self.span_y().div_ceil(u128::from(height));
        Ok(BigUint::from(meta_x) * BigUint::from(meta_y))
    }

    pub fn at(&self, zoom_level: i32) -> TileRange3D {
        TileRange3D::new(zoom_level, *self)
    }
}

fn verify(lower_left: TileIndex2D, upper_right: TileIndex2D) -> Result<()> {
    if upper_right.x() < lower_left.x() {
        return Err(TilingError::InvalidRange("upperRight.x < lowerLeft.x".into()));
    }
    if upper_right.y() < lower_left.y() {
        return Err(TilingError::InvalidRange("upperRight.y < lowerLeft.y".into()));
    }
    Ok(())
}

pub(crate) fn check_meta_tile_size(width: u32, height: u32) -> Result<()> {
    if width == 0 {
        return Err(TilingError::InvalidMetaTileSize {
            dimension: "width",
            value: width,
        });
    }
    if height == 0 {
        return Err(TilingError::InvalidMetaTileSize {
            dimension: "height",
            value: height,
        });
    }
    Ok(())
}

impl fmt::Display for TileRange2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TileRange2D[x: {} - {}, y: {} - {}]",
            self.minx(),
            self.maxx(),
            self.miny(),
            self.maxy()
        )
    }
}

/// Lazy row-major traversal of a [`TileRange2D`].
#[derive(Debug, Clone)]
pub struct Tiles {
    range: TileRange2D,
    next: Option<TileIndex2D>,
}

impl Iterator for Tiles {
    type Item = TileIndex2D;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = if current.x() < self.range.maxx() {
            Some(TileIndex2D::of(current.x() + 1, current.y()))
        } else if current.y() < self.range.maxy() {
            Some(TileIndex2D::of(self.range.minx(), current.y() + 1))
        } else {
            None
        };
        Some(current)
    }
}

impl FusedIterator for Tiles {}

/// Lazy metatile decomposition of a [`TileRange2D`].
#[derive(Debug, Clone)]
pub struct MetaTiles {
    range: TileRange2D,
    width: u32,
    height: u32,
    /// lower-left corner of the next block
    next: Option<TileIndex2D>,
}

impl Iterator for MetaTiles {
    type Item = TileRange2D;

    fn next(&mut self) -> Option<Self::Item> {
        let lower_left = self.next?;
        let range = &self.range;

        let maxx = range
            .maxx()
            .min(lower_left.x().saturating_add(i64::from(self.width) - 1));
        let maxy = range
            .maxy()
            .min(lower_left.y().saturating_add(i64::from(self.height) - 1));

        self.next = if maxx < range.maxx() {
            Some(TileIndex2D::of(maxx + 1, lower_left.y()))
        } else if maxy < range.maxy() {
            Some(TileIndex2D::of(range.minx(), maxy + 1))
        } else {
            None
        };

        Some(TileRange2D {
            lower_left,
            upper_right: TileIndex2D::of(maxx, maxy),
        })
    }
}

impl FusedIterator for MetaTiles {}

/// A [`TileRange2D`] pinned to a zoom level. Ordered by zoom level, then tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileRange3D {
    zoom_level: i32,
    tiles: TileRange2D,
}

impl TileRange3D {
    pub const fn new(zoom_level: i32, tiles: TileRange2D) -> Self {
        Self { zoom_level, tiles }
    }

    pub fn of(zoom_level: i32, minx: i64, miny: i64, maxx: i64, maxy: i64) -> Result<Self> {
        Ok(Self::new(zoom_level, TileRange2D::of(minx, miny, maxx, maxy)?))
    }

    pub const fn zoom_level(&self) -> i32 {
        self.zoom_level
    }

    pub const fn tiles(&self) -> &TileRange2D {
        &self.tiles
    }

    pub fn count(&self) -> BigUint {
        self.tiles.count()
    }

    pub fn contains(&self, tile: TileIndex3D) -> bool {
        tile.z() == self.zoom_level && self.tiles.contains(tile.index())
    }

    pub fn as_tiles(&self) -> impl Iterator<Item = TileIndex3D> + use<> {
        let z = self.zoom_level;
        self.tiles.as_tiles().map(move |index| index.at(z))
    }

    pub fn as_meta_tiles(
        &self,
        width: u32,
        height: u32,
    ) -> Result<impl Iterator<Item = TileRange3D> + use<>> {
        let z = self.zoom_level;
        Ok(self
            .tiles
            .as_meta_tiles(width, height)?
            .map(move |block| block.at(z)))
    }

    pub fn count_meta_tiles(&self, width: u32, height: u32) -> Result<BigUint> {
        self.tiles.count_meta_tiles(width, height)
    }
}

impl fmt::Display for TileRange3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TileRange3D[z: {}, x: {} - {}, y: {} - {}]",
            self.zoom_level,
            self.tiles.minx(),
            self.tiles.maxx(),
            self.tiles.miny(),
            self.tiles.maxy()
        )
    }
}
