//! Tile addressing algebra.
//!
//! - [`TileIndex2D`] / [`TileIndex3D`] address a single tile
//! - [`TileRange2D`] / [`TileRange3D`] are inclusive rectangles of tiles,
//!   countable, enumerable and decomposable into metatiles
//! - [`TilePyramid`] holds at most one range per zoom level
//!
//! Counts are arbitrary precision ([`num_bigint::BigUint`]) since a deep
//! pyramid easily exceeds `u64`.

mod index;
mod pyramid;
mod range;

pub use index::{TileIndex2D, TileIndex3D};
pub use pyramid::TilePyramid;
pub use range::{MetaTiles, TileRange2D, TileRange3D, Tiles};
