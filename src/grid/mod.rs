//! Grids and layers: the metadata a tile pyramid is built from.
//!
//! - [`Gridset`] - a tile matrix set with a lower-left origin
//! - [`GridSubset`] - a layer's view of a gridset; [`GridSubsetInfo`] is the
//!   coverage-backed implementation
//! - [`TileLayerResolver`] - layer lookup; [`LayerCatalog`] keeps layers in memory
//! - [`TilePyramidBuilder`] - validated pyramid for a layer, gridset and zoom span

mod bbox;
mod builder;
mod gridset;
mod layer;
mod subset;

pub use bbox::BoundingBox;
pub use builder::TilePyramidBuilder;
pub use gridset::{EPSG_4326, EPSG_900913, Gridset};
pub use layer::{LayerCatalog, TileLayerInfo, TileLayerResolver};
pub use subset::{GridSubset, GridSubsetInfo};
